//! Trait abstractions for I/O operations to enable mocking in tests.
//!
//! These traits abstract over HTTP, external processes, archive extraction
//! and the App Store service, allowing tests to inject implementations that
//! simulate failures, timeouts and specific response scenarios.

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use lt_core::{ArchiveFormat, Error, Version};

use crate::appstore::StoreEvents;

/// HTTP client trait for abstracting network operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and return the response body as bytes.
    async fn get(&self, url: &str) -> Result<Vec<u8>, Error>;
}

/// Package manager queried and driven as an external process.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Latest version the package manager knows for `token`.
    async fn latest_version(&self, token: &str) -> Result<Version, Error>;

    /// Upgrade `token`, passing each line of combined output to `on_output`.
    async fn upgrade(&self, token: &str, on_output: &(dyn for<'a> Fn(&'a str) + Send + Sync))
    -> Result<(), Error>;
}

/// Unpacks a downloaded update archive into a directory.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract(&self, archive: &Path, format: ArchiveFormat, dest: &Path)
    -> Result<(), Error>;
}

/// The privileged App Store purchase/download service.
///
/// Implementations must report unavailability instead of blocking.
#[async_trait]
pub trait StoreService: Send + Sync {
    /// Whether the service can be reached on this host.
    fn is_available(&self) -> bool;

    /// Start a (re)download of the catalog item.
    async fn purchase(&self, item_id: u64) -> Result<(), Error>;

    /// Subscribe to the events of one catalog item.
    fn observe(&self, item_id: u64) -> Result<StoreEvents, Error>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(crate::USER_AGENT)
                .pool_max_idle_per_host(10)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::DownloadFailed {
                message: format!("HTTP {} for {}", response.status(), url),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::DownloadFailed {
                message: e.to_string(),
            })
    }
}
