pub mod appstore;
pub mod checker;
pub mod discovery;
pub mod download;
pub mod engine;
pub mod extract;
pub mod homebrew;
pub mod install;
pub mod repository;
pub mod scan;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub const USER_AGENT: &str = concat!("latest/", env!("CARGO_PKG_VERSION"));

pub use appstore::{DownloadQueue, StoreEvent, StoreEvents, StoreNotification, UnavailableStore};
pub use checker::{
    AppStoreChecker, CheckerSet, HomebrewChecker, SparkleChecker, StoreCatalog, UpdateChecker,
};
pub use discovery::{AppDiscovery, BundleScanner};
pub use download::Downloader;
pub use engine::{Engine, EngineConfig, Services};
pub use extract::SystemExtractor;
pub use homebrew::Homebrew;
pub use install::{
    InstallCoordinator, InstallHandle, InstallProgress, InstallRequest, InstallSession,
    InstallState, InstallStrategy,
};
pub use repository::{RepositoryEntry, UpdateRepository};
pub use scan::{ScanConfig, UpdateCoordinator};
pub use traits::{ArchiveExtractor, HttpClient, PackageManager, ReqwestHttpClient, StoreService};
