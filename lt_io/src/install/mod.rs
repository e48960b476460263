//! Install coordination
//!
//! Installs run as background tasks, one per app at a time. Each task drives
//! an [`InstallSession`] whose state changes are streamed to the caller
//! through an [`InstallHandle`]. Strategies:
//!
//! - `homebrew` - package manager upgrade with streamed output
//! - `appstore` - store re-download observed through the download queue
//! - `sparkle` - download, extract and replace the bundle in place

mod appstore;
mod homebrew;
mod session;
mod sparkle;


use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use lt_core::{Error, InstalledApp, Source, UpdateRecord};

use crate::repository::UpdateRepository;

pub use appstore::AppStoreInstaller;
pub use homebrew::HomebrewInstaller;
pub use session::{InstallProgress, InstallSession, InstallState};
pub use sparkle::{SparkleInstaller, locate_bundle, replace_bundle};

/// What an install works from: the app and its last check result.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub app: InstalledApp,
    pub update: Option<UpdateRecord>,
}

/// Installs updates for one source.
#[async_trait]
pub trait InstallStrategy: Send + Sync {
    fn source(&self) -> Source;

    /// Perform the install, reporting progress through `session`.
    ///
    /// Terminal states are set by the coordinator from the returned result.
    async fn install(&self, request: &InstallRequest, session: &InstallSession) -> Result<(), Error>;
}

/// Caller side of a running install.
#[derive(Debug)]
pub struct InstallHandle {
    app_id: String,
    events: mpsc::UnboundedReceiver<InstallProgress>,
    task: JoinHandle<InstallState>,
}

impl InstallHandle {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Next state change, or `None` once the install has finished and all
    /// changes were delivered.
    pub async fn next(&mut self) -> Option<InstallProgress> {
        self.events.recv().await
    }

    /// Forward every remaining state change to `on_progress` and return the
    /// terminal state.
    pub async fn wait_with(mut self, mut on_progress: impl FnMut(&InstallProgress)) -> InstallState {
        while let Some(progress) = self.events.recv().await {
            on_progress(&progress);
        }

        match self.task.await {
            Ok(state) => state,
            Err(e) => InstallState::Failed(Error::InstallAborted {
                id: self.app_id.clone(),
                message: e.to_string(),
            }),
        }
    }

    pub async fn wait(self) -> InstallState {
        self.wait_with(|_| {}).await
    }
}

/// Set of app ids with an install in flight.
#[derive(Default)]
struct ActiveInstalls {
    ids: Mutex<HashSet<String>>,
}

impl ActiveInstalls {
    fn claim(self: &Arc<Self>, app_id: &str) -> Result<ActiveGuard, Error> {
        let mut ids = self.ids.lock().unwrap_or_else(|p| p.into_inner());
        if !ids.insert(app_id.to_string()) {
            return Err(Error::InstallInProgress {
                id: app_id.to_string(),
            });
        }
        Ok(ActiveGuard {
            active: Arc::clone(self),
            app_id: app_id.to_string(),
        })
    }

    fn contains(&self, app_id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(app_id)
    }
}

/// Releases the app id when the install ends, however it ends.
struct ActiveGuard {
    active: Arc<ActiveInstalls>,
    app_id: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.app_id);
    }
}

pub struct InstallCoordinator {
    repository: Arc<UpdateRepository>,
    strategies: Vec<Arc<dyn InstallStrategy>>,
    active: Arc<ActiveInstalls>,
}

impl InstallCoordinator {
    pub fn new(repository: Arc<UpdateRepository>, strategies: Vec<Arc<dyn InstallStrategy>>) -> Self {
        Self {
            repository,
            strategies,
            active: Arc::new(ActiveInstalls::default()),
        }
    }

    pub fn is_installing(&self, app_id: &str) -> bool {
        self.active.contains(app_id)
    }

    /// Start installing the latest known update of `app_id`.
    ///
    /// Unknown apps, apps whose last check found nothing newer, sources
    /// without a strategy and apps with an install already running are
    /// rejected immediately. Everything else is reported
    /// through the returned handle. Must be called within a Tokio runtime.
    pub fn install(&self, app_id: &str) -> Result<InstallHandle, Error> {
        let entry = self.repository.get(app_id).ok_or_else(|| Error::AppNotFound {
            id: app_id.to_string(),
        })?;

        let app = entry.outcome.app;
        let update = entry.outcome.result.ok();
        if let Some(record) = &update
            && !record.update_available()
        {
            return Err(Error::UpToDate {
                id: app_id.to_string(),
                version: app.version.display_string(),
            });
        }
        let source = update.as_ref().map_or(app.source, |u| u.source);

        let strategy = self
            .strategies
            .iter()
            .find(|s| s.source() == source)
            .cloned()
            .ok_or_else(|| Error::UnsupportedSource {
                id: app_id.to_string(),
                source: source.to_string(),
            })?;

        let guard = self.active.claim(app_id)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let session = InstallSession::new(app_id, source, tx);
        let request = InstallRequest { app, update };

        info!(app = app_id, %source, "starting install");
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(strategy.install(&request, &session))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(Error::InstallAborted {
                        id: request.app.id.clone(),
                        message: "installer panicked".to_string(),
                    })
                });

            if let Err(e) = &result {
                warn!(app = %request.app.id, error = %e, "install failed");
            }

            // Free the id before the terminal state is observable.
            drop(guard);
            session.finish(result)
        });

        Ok(InstallHandle {
            app_id: app_id.to_string(),
            events: rx,
            task,
        })
    }
}
