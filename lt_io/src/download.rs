use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use lt_core::Error;

/// Progress callback: (bytes received so far, total size if announced).
pub type DownloadProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Streams update archives to disk.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(crate::USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: DownloadProgress<'_>,
    ) -> Result<u64, Error> {
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

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::DownloadFailed {
                message: format!("failed to create {}: {}", dest.display(), e),
            })?;

        on_progress(0, total);

        let mut loaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::DownloadFailed {
                message: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::DownloadFailed {
                    message: format!("failed to write {}: {}", dest.display(), e),
                })?;
            loaded += chunk.len() as u64;
            on_progress(loaded, total);
        }

        file.flush().await.map_err(|e| Error::DownloadFailed {
            message: e.to_string(),
        })?;

        if let Some(total) = total
            && loaded < total
        {
            return Err(Error::DownloadFailed {
                message: format!("connection closed after {} of {} bytes", loaded, total),
            });
        }

        debug!(url, bytes = loaded, "download complete");
        Ok(loaded)
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}
