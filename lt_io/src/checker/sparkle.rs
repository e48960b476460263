use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lt_core::{Error, InstalledApp, Source, UpdateRecord, best_feed_item};

use super::UpdateChecker;
use crate::traits::HttpClient;

/// Checks apps that publish an appcast feed.
pub struct SparkleChecker {
    http: Arc<dyn HttpClient>,
}

impl SparkleChecker {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl UpdateChecker for SparkleChecker {
    fn source(&self) -> Source {
        Source::Sparkle
    }

    fn can_handle(&self, app: &InstalledApp) -> bool {
        app.feed_url.is_some()
    }

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error> {
        let unavailable = || Error::UpdateInfoUnavailable { id: app.id.clone() };
        let feed_url = app.feed_url.as_deref().ok_or_else(unavailable)?;

        let payload = self.http.get(feed_url).await.map_err(|e| {
            debug!(app = %app.id, feed = feed_url, error = %e, "feed fetch failed");
            unavailable()
        })?;

        let item = best_feed_item(&app.id, &String::from_utf8_lossy(&payload))?;

        let mut record = UpdateRecord::new(app.clone(), item.version, Source::Sparkle);
        record.download_url = item.download_url;
        Ok(record)
    }
}
