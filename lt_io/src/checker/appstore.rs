use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use lt_core::{Error, InstalledApp, ReleaseNotes, Source, UpdateRecord, Version};

use super::UpdateChecker;
use crate::traits::{HttpClient, StoreService};

pub const DEFAULT_CATALOG_URL: &str = "https://itunes.apple.com";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub track_id: u64,
    pub version: String,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub bundle_id: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<CatalogEntry>,
}

/// Public store catalog lookup.
pub struct StoreCatalog {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl StoreCatalog {
    pub fn new(http: Arc<dyn HttpClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look the app up by catalog id when known, by bundle id otherwise.
    pub async fn lookup(&self, app: &InstalledApp) -> Result<Option<CatalogEntry>, Error> {
        let endpoint = format!("{}/lookup", self.base_url);
        let url = match app.store_item_id {
            Some(item_id) => {
                reqwest::Url::parse_with_params(&endpoint, &[("id", item_id.to_string().as_str())])
            }
            None => reqwest::Url::parse_with_params(
                &endpoint,
                &[("bundleId", app.id.as_str()), ("entity", "desktopSoftware")],
            ),
        }
        .map_err(|e| Error::CheckFailed {
            id: app.id.clone(),
            message: format!("invalid catalog url '{}': {}", endpoint, e),
        })?;

        let body = self.http.get(url.as_str()).await.map_err(|e| Error::CheckFailed {
            id: app.id.clone(),
            message: e.to_string(),
        })?;

        let response: LookupResponse =
            serde_json::from_slice(&body).map_err(|e| Error::CheckFailed {
                id: app.id.clone(),
                message: format!("invalid catalog response: {}", e),
            })?;

        Ok(response.results.into_iter().next())
    }
}

pub struct AppStoreChecker {
    catalog: StoreCatalog,
    service: Arc<dyn StoreService>,
}

impl AppStoreChecker {
    pub fn new(catalog: StoreCatalog, service: Arc<dyn StoreService>) -> Self {
        Self { catalog, service }
    }
}

#[async_trait]
impl UpdateChecker for AppStoreChecker {
    fn source(&self) -> Source {
        Source::AppStore
    }

    fn can_handle(&self, app: &InstalledApp) -> bool {
        app.source == Source::AppStore || app.store_item_id.is_some()
    }

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error> {
        if !self.service.is_available() {
            return Err(Error::ServiceUnavailable {
                message: format!("cannot check '{}' without the App Store service", app.id),
            });
        }

        let entry = self
            .catalog
            .lookup(app)
            .await?
            .ok_or_else(|| Error::UpdateInfoUnavailable { id: app.id.clone() })?;

        let mut record =
            UpdateRecord::new(app.clone(), Version::release(&entry.version), Source::AppStore);
        record.store_item_id = Some(entry.track_id);
        record.release_notes = entry
            .release_notes
            .filter(|notes| !notes.trim().is_empty())
            .map(ReleaseNotes::Text);
        Ok(record)
    }
}
