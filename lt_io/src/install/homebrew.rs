use std::sync::Arc;

use async_trait::async_trait;

use lt_core::{Error, Source};

use super::{InstallRequest, InstallSession, InstallStrategy};
use crate::traits::PackageManager;

/// Upgrades casks through the package manager.
pub struct HomebrewInstaller {
    brew: Arc<dyn PackageManager>,
}

impl HomebrewInstaller {
    pub fn new(brew: Arc<dyn PackageManager>) -> Self {
        Self { brew }
    }
}

#[async_trait]
impl InstallStrategy for HomebrewInstaller {
    fn source(&self) -> Source {
        Source::Homebrew
    }

    async fn install(&self, request: &InstallRequest, session: &InstallSession) -> Result<(), Error> {
        let token = request
            .app
            .cask_token
            .as_deref()
            .ok_or_else(|| Error::UpdateInfoUnavailable {
                id: request.app.id.clone(),
            })?;

        session.installing(Some(&format!("Running brew upgrade --cask {}", token)));
        self.brew
            .upgrade(token, &|line| session.installing(Some(line)))
            .await
    }
}
