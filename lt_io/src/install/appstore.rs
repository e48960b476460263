use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lt_core::{Error, Source};

use super::{InstallRequest, InstallSession, InstallStrategy};
use crate::appstore::StoreEvent;
use crate::traits::StoreService;

/// Re-downloads apps through the App Store service.
pub struct AppStoreInstaller {
    service: Arc<dyn StoreService>,
}

impl AppStoreInstaller {
    pub fn new(service: Arc<dyn StoreService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl InstallStrategy for AppStoreInstaller {
    fn source(&self) -> Source {
        Source::AppStore
    }

    async fn install(&self, request: &InstallRequest, session: &InstallSession) -> Result<(), Error> {
        if !self.service.is_available() {
            return Err(Error::ServiceUnavailable {
                message: format!("cannot install '{}' without the App Store service", request.app.id),
            });
        }

        let item_id = request
            .update
            .as_ref()
            .and_then(|u| u.store_item_id)
            .or(request.app.store_item_id)
            .ok_or_else(|| Error::UpdateInfoUnavailable {
                id: request.app.id.clone(),
            })?;

        // Subscribe before purchasing so no early event is missed.
        let mut events = self.service.observe(item_id)?;
        self.service.purchase(item_id).await?;

        while let Some(event) = events.recv().await {
            match event {
                StoreEvent::Connecting => debug!(item_id, "store connecting"),
                StoreEvent::Downloading { loaded, total } => session.downloading(loaded, Some(total)),
                StoreEvent::Extracting { fraction } => session.extracting(fraction),
                StoreEvent::Installing => session.installing(None),
                StoreEvent::Finished => return Ok(()),
                StoreEvent::Failed { message } => return Err(Error::DownloadFailed { message }),
            }
        }

        Err(Error::DownloadFailed {
            message: format!("App Store stopped reporting on item {}", item_id),
        })
    }
}
