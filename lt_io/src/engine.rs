//! Wires discovery, checkers and installers into one entry point.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use lt_core::{CheckOutcome, Error, InstalledApp};

use crate::appstore::UnavailableStore;
use crate::checker::{
    AppStoreChecker, CheckerSet, DEFAULT_CATALOG_URL, HomebrewChecker, SparkleChecker,
    StoreCatalog, UpdateChecker,
};
use crate::discovery::{AppDiscovery, BundleScanner};
use crate::download::Downloader;
use crate::extract::SystemExtractor;
use crate::homebrew::Homebrew;
use crate::install::{
    AppStoreInstaller, HomebrewInstaller, InstallCoordinator, InstallHandle, InstallStrategy,
    SparkleInstaller,
};
use crate::repository::UpdateRepository;
use crate::scan::{ScanConfig, UpdateCoordinator};
use crate::traits::{
    ArchiveExtractor, HttpClient, PackageManager, ReqwestHttpClient, StoreService,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scan: ScanConfig,
    /// Directories searched for `.app` bundles; system defaults when empty
    pub app_dirs: Vec<PathBuf>,
    pub caskroom: Option<PathBuf>,
    /// `brew` executable; located automatically when unset
    pub brew: Option<PathBuf>,
    /// `unzip` executable; `/usr/bin/unzip` when unset
    pub unzip: Option<PathBuf>,
    pub catalog_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            app_dirs: Vec::new(),
            caskroom: None,
            brew: None,
            unzip: None,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
        }
    }
}

/// External collaborators the engine talks to.
pub struct Services {
    pub discovery: Arc<dyn AppDiscovery>,
    pub http: Arc<dyn HttpClient>,
    pub store: Arc<dyn StoreService>,
    pub package_manager: Option<Arc<dyn PackageManager>>,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub downloader: Downloader,
}

impl Services {
    /// Real implementations configured from `config`.
    pub fn system(config: &EngineConfig) -> Self {
        let scanner = if config.app_dirs.is_empty() {
            BundleScanner::system()
        } else {
            BundleScanner::new(config.app_dirs.clone())
        };
        let scanner = match &config.caskroom {
            Some(caskroom) => scanner.with_caskroom(caskroom.clone()),
            None => scanner,
        };

        let brew = match &config.brew {
            Some(path) => Some(Homebrew::new(path)),
            None => Homebrew::locate(),
        };
        if brew.is_none() {
            debug!("brew not found, Homebrew apps will not be checked");
        }

        let extractor = config
            .unzip
            .as_ref()
            .map(SystemExtractor::new)
            .unwrap_or_default();

        Self {
            discovery: Arc::new(scanner),
            http: Arc::new(ReqwestHttpClient::new()),
            store: Arc::new(UnavailableStore::default()),
            package_manager: brew.map(|b| Arc::new(b) as Arc<dyn PackageManager>),
            extractor: Arc::new(extractor),
            downloader: Downloader::new(),
        }
    }
}

pub struct Engine {
    discovery: Arc<dyn AppDiscovery>,
    scanner: UpdateCoordinator,
    installer: InstallCoordinator,
    repository: Arc<UpdateRepository>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let services = Services::system(&config);
        Self::with_services(config, services)
    }

    pub fn with_services(config: EngineConfig, services: Services) -> Self {
        let repository = Arc::new(UpdateRepository::new());
        let catalog = StoreCatalog::new(Arc::clone(&services.http), &config.catalog_url);

        // Registration order is the probing order for apps of unknown source.
        let mut checkers: Vec<Arc<dyn UpdateChecker>> = vec![Arc::new(AppStoreChecker::new(
            catalog,
            Arc::clone(&services.store),
        ))];
        let mut strategies: Vec<Arc<dyn InstallStrategy>> =
            vec![Arc::new(AppStoreInstaller::new(services.store))];

        if let Some(brew) = services.package_manager {
            checkers.push(Arc::new(HomebrewChecker::new(Arc::clone(&brew))));
            strategies.push(Arc::new(HomebrewInstaller::new(brew)));
        }

        checkers.push(Arc::new(SparkleChecker::new(services.http)));
        strategies.push(Arc::new(SparkleInstaller::new(
            services.downloader,
            services.extractor,
        )));

        Self {
            discovery: services.discovery,
            scanner: UpdateCoordinator::new(
                CheckerSet::new(checkers),
                Arc::clone(&repository),
                config.scan,
            ),
            installer: InstallCoordinator::new(Arc::clone(&repository), strategies),
            repository,
        }
    }

    pub fn repository(&self) -> &Arc<UpdateRepository> {
        &self.repository
    }

    pub fn list_apps(&self) -> Vec<InstalledApp> {
        self.discovery.list_installed_apps()
    }

    /// Discover installed apps and check all of them.
    pub async fn check_all(&self) -> Vec<CheckOutcome> {
        let apps = self.list_apps();
        self.scanner.scan(apps).await
    }

    /// Install the update for `app_id`, checking it first if no outcome is
    /// recorded yet.
    pub async fn install(&self, app_id: &str) -> Result<InstallHandle, Error> {
        if self.repository.get(app_id).is_none() {
            let app = self
                .list_apps()
                .into_iter()
                .find(|a| a.id == app_id)
                .ok_or_else(|| Error::AppNotFound {
                    id: app_id.to_string(),
                })?;
            self.scanner.scan(vec![app]).await;
        }

        self.installer.install(app_id)
    }

    pub fn is_installing(&self, app_id: &str) -> bool {
        self.installer.is_installing(app_id)
    }
}
