//! Per-source update checkers and their selection.

mod appstore;
mod homebrew;
mod sparkle;

pub use appstore::{AppStoreChecker, CatalogEntry, DEFAULT_CATALOG_URL, StoreCatalog};
pub use homebrew::HomebrewChecker;
pub use sparkle::SparkleChecker;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use lt_core::{Error, InstalledApp, Source, UpdateRecord};

/// Looks up the newest version of an app through one update channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    fn source(&self) -> Source;

    /// Whether the app carries the metadata this checker needs.
    fn can_handle(&self, app: &InstalledApp) -> bool;

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error>;
}

/// Checker for apps no channel can handle.
pub struct UnknownSourceChecker;

#[async_trait]
impl UpdateChecker for UnknownSourceChecker {
    fn source(&self) -> Source {
        Source::Unknown
    }

    fn can_handle(&self, _app: &InstalledApp) -> bool {
        true
    }

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error> {
        Err(Error::UpdateInfoUnavailable { id: app.id.clone() })
    }
}

/// Ordered set of checkers with a fallback.
#[derive(Clone)]
pub struct CheckerSet {
    checkers: Vec<Arc<dyn UpdateChecker>>,
    fallback: Arc<dyn UpdateChecker>,
}

impl CheckerSet {
    pub fn new(checkers: Vec<Arc<dyn UpdateChecker>>) -> Self {
        Self {
            checkers,
            fallback: Arc::new(UnknownSourceChecker),
        }
    }

    /// Pick the checker for `app`.
    ///
    /// An app with a known source only goes to checkers of that source.
    /// Apps of unknown source go to the first checker, in registration order,
    /// that can handle them. Without a match the fallback reports that no
    /// update information is available.
    pub fn select(&self, app: &InstalledApp) -> Arc<dyn UpdateChecker> {
        self.checkers
            .iter()
            .find(|checker| {
                (app.source == Source::Unknown || checker.source() == app.source)
                    && checker.can_handle(app)
            })
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}
