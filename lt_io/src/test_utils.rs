//! Test utilities for latest
//!
//! Shared fixtures for unit and integration tests:
//!
//! - `TestContext` - wraps a TempDir, a MockServer and an [`Engine`] wired to them
//! - Feed and archive fixtures - appcasts, `.app` tarballs, catalog responses
//! - Bundle fixtures - `.app` directories with an XML `Info.plist`
//! - Fakes - package manager, store service and update checker
//!
//! # Example
//!
//! ```ignore
//! use lt_io::test_utils::{BundleSpec, TestContext};
//!
//! #[tokio::test]
//! async fn test_check() {
//!     let ctx = TestContext::new().await;
//!     ctx.install_sparkle_app(&BundleSpec::new("Example", "com.example.app", "1.0"));
//!     ctx.mount_appcast("com.example.app", &[("2.0", "200", "Example-2.0.tar.gz")]).await;
//!
//!     let outcomes = ctx.engine().check_all().await;
//!     assert!(outcomes[0].update().is_some());
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lt_core::{Error, InstalledApp, Source, UpdateRecord, Version};

use crate::appstore::{DownloadQueue, StoreEvent, StoreEvents, StoreNotification};
use crate::checker::UpdateChecker;
use crate::discovery::BundleScanner;
use crate::download::Downloader;
use crate::engine::{Engine, EngineConfig, Services};
use crate::extract::SystemExtractor;
use crate::scan::ScanConfig;
use crate::traits::{PackageManager, ReqwestHttpClient, StoreService};

// ============================================================================
// Feed and archive fixtures
// ============================================================================

/// Build an appcast with one item per `(release, build, url)`.
pub fn appcast(items: &[(&str, &str, &str)]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|(release, build, url)| {
            format!(
                r#"    <item>
      <title>Version {release}</title>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <enclosure url="{url}" sparkle:version="{build}" sparkle:shortVersionString="{release}" length="1024" type="application/octet-stream"/>
    </item>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
  <channel>
    <title>Changelog</title>
{}
  </channel>
</rss>"#,
        items.join("\n")
    )
}

fn info_plist(id: &str, name: &str, release: &str, build: Option<&str>, feed: Option<&str>) -> String {
    let mut keys = vec![
        format!("  <key>CFBundleIdentifier</key>\n  <string>{id}</string>"),
        format!("  <key>CFBundleName</key>\n  <string>{name}</string>"),
        format!("  <key>CFBundleShortVersionString</key>\n  <string>{release}</string>"),
    ];
    if let Some(build) = build {
        keys.push(format!("  <key>CFBundleVersion</key>\n  <string>{build}</string>"));
    }
    if let Some(feed) = feed {
        keys.push(format!("  <key>SUFeedURL</key>\n  <string>{feed}</string>"));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
{}
</dict>
</plist>"#,
        keys.join("\n")
    )
}

/// Gzipped tarball containing the given `.app` bundles at its top level.
pub fn app_tarball(bundles: &[&str]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tar::Builder;

    let mut builder = Builder::new(Vec::new());

    for bundle in bundles {
        let name = bundle.trim_end_matches(".app");
        let files: [(String, Vec<u8>, u32); 2] = [
            (
                format!("{bundle}/Contents/Info.plist"),
                info_plist(&format!("com.example.{}", name.to_lowercase().replace(' ', "-")), name, "2.0", None, None)
                    .into_bytes(),
                0o644,
            ),
            (
                format!("{bundle}/Contents/MacOS/{name}"),
                b"#!/bin/sh\necho updated\n".to_vec(),
                0o755,
            ),
        ];

        for (rel_path, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(&rel_path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            builder.append(&header, content.as_slice()).unwrap();
        }
    }

    let tar_data = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

// ============================================================================
// Bundle fixtures
// ============================================================================

/// Description of an installed `.app` bundle.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub name: String,
    pub id: String,
    pub release: String,
    pub build: Option<String>,
    pub feed_url: Option<String>,
    pub store_receipt: bool,
}

impl BundleSpec {
    pub fn new(name: &str, id: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            release: release.to_string(),
            build: None,
            feed_url: None,
            store_receipt: false,
        }
    }

    pub fn with_build(mut self, build: &str) -> Self {
        self.build = Some(build.to_string());
        self
    }

    pub fn with_feed(mut self, url: &str) -> Self {
        self.feed_url = Some(url.to_string());
        self
    }

    pub fn with_store_receipt(mut self) -> Self {
        self.store_receipt = true;
        self
    }
}

/// Write `<dir>/<name>.app` with an XML Info.plist. Returns the bundle path.
pub fn write_app_bundle(dir: &Path, spec: &BundleSpec) -> PathBuf {
    let bundle = dir.join(format!("{}.app", spec.name));
    let contents = bundle.join("Contents");
    fs::create_dir_all(contents.join("MacOS")).unwrap();
    fs::write(
        contents.join("Info.plist"),
        info_plist(
            &spec.id,
            &spec.name,
            &spec.release,
            spec.build.as_deref(),
            spec.feed_url.as_deref(),
        ),
    )
    .unwrap();
    fs::write(contents.join("MacOS").join(&spec.name), "installed").unwrap();

    if spec.store_receipt {
        fs::create_dir_all(contents.join("_MASReceipt")).unwrap();
        fs::write(contents.join("_MASReceipt/receipt"), b"receipt").unwrap();
    }

    bundle
}

// ============================================================================
// HTTP mocks
// ============================================================================

/// Serve `bytes` at `url_path`.
pub async fn mock_archive(server: &MockServer, url_path: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

/// Serve a store catalog lookup answering `?<param>=<value>`.
pub async fn mock_catalog_lookup(
    server: &MockServer,
    param: &str,
    value: &str,
    track_id: u64,
    version: &str,
    release_notes: &str,
) {
    let body = serde_json::json!({
        "resultCount": 1,
        "results": [{
            "trackId": track_id,
            "bundleId": "com.example.store",
            "version": version,
            "releaseNotes": release_notes,
        }]
    });

    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param(param, value))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Create a mock response that delays before answering.
pub fn mock_timeout_response(delay: Duration, body: Option<Vec<u8>>) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(200).set_delay(delay);
    if let Some(bytes) = body {
        response = response.set_body_bytes(bytes);
    }
    response
}

/// Create a mock response that claims more data than it sends.
pub fn mock_truncated_download(data: &[u8], claimed_length: usize) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Length", claimed_length.to_string())
        .set_body_bytes(data.to_vec())
}

// ============================================================================
// Fakes
// ============================================================================

/// In-memory package manager.
#[derive(Default)]
pub struct FakePackageManager {
    versions: HashMap<String, Version>,
    failure: Option<Error>,
    output: Vec<String>,
    upgrades: Mutex<Vec<String>>,
}

impl FakePackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, token: &str, version: Version) -> Self {
        self.versions.insert(token.to_string(), version);
        self
    }

    /// Every operation fails with `error`.
    pub fn failing_with(mut self, error: Error) -> Self {
        self.failure = Some(error);
        self
    }

    /// Lines reported by `upgrade`.
    pub fn with_output(mut self, lines: &[&str]) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn upgrades(&self) -> Vec<String> {
        self.upgrades.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageManager for FakePackageManager {
    async fn latest_version(&self, token: &str) -> Result<Version, Error> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.versions
            .get(token)
            .cloned()
            .ok_or_else(|| Error::UpdateInfoUnavailable {
                id: token.to_string(),
            })
    }

    async fn upgrade(
        &self,
        token: &str,
        on_output: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<(), Error> {
        self.upgrades.lock().unwrap().push(token.to_string());
        for line in &self.output {
            on_output(line);
        }
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Store service backed by a [`DownloadQueue`].
///
/// Scripted events are dispatched for the purchased item as soon as the
/// purchase is made. Without a script, tests drive the queue directly.
pub struct FakeStoreService {
    queue: Arc<DownloadQueue>,
    available: bool,
    foreign: Vec<StoreNotification>,
    script: Vec<StoreEvent>,
    purchases: Mutex<Vec<u64>>,
}

impl FakeStoreService {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(DownloadQueue::new()),
            available: true,
            foreign: Vec::new(),
            script: Vec::new(),
            purchases: Mutex::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: Vec<StoreEvent>) -> Self {
        self.script = events;
        self
    }

    /// Event for another item, dispatched before the scripted ones.
    pub fn with_foreign_event(mut self, item_id: u64, event: StoreEvent) -> Self {
        self.foreign.push(StoreNotification { item_id, event });
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn queue(&self) -> &Arc<DownloadQueue> {
        &self.queue
    }

    pub fn purchases(&self) -> Vec<u64> {
        self.purchases.lock().unwrap().clone()
    }
}

impl Default for FakeStoreService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreService for FakeStoreService {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn purchase(&self, item_id: u64) -> Result<(), Error> {
        if !self.available {
            return Err(Error::ServiceUnavailable {
                message: "fake store offline".to_string(),
            });
        }
        self.purchases.lock().unwrap().push(item_id);

        for notification in &self.foreign {
            self.queue.dispatch(notification.clone());
        }
        for event in &self.script {
            self.queue.dispatch(StoreNotification {
                item_id,
                event: event.clone(),
            });
        }
        Ok(())
    }

    fn observe(&self, item_id: u64) -> Result<StoreEvents, Error> {
        if !self.available {
            return Err(Error::ServiceUnavailable {
                message: "fake store offline".to_string(),
            });
        }
        self.queue.subscribe(item_id)
    }
}

/// What a [`FakeChecker`] does when asked.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Report this remote release
    Version(&'static str),
    /// Sleep, then report the installed version
    Delay(Duration),
    Fail(Error),
    Panic,
}

/// Checker that handles every app, counting calls and concurrency.
pub struct FakeChecker {
    source: Source,
    behavior: FakeBehavior,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeChecker {
    pub fn new(source: Source, behavior: FakeBehavior) -> Self {
        Self {
            source,
            behavior,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UpdateChecker for FakeChecker {
    fn source(&self) -> Source {
        self.source
    }

    fn can_handle(&self, _app: &InstalledApp) -> bool {
        true
    }

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match &self.behavior {
            FakeBehavior::Version(v) => Ok(UpdateRecord::new(app.clone(), Version::release(v), self.source)),
            FakeBehavior::Delay(d) => {
                tokio::time::sleep(*d).await;
                Ok(UpdateRecord::new(app.clone(), app.version.clone(), self.source))
            }
            FakeBehavior::Fail(e) => Err(e.clone()),
            FakeBehavior::Panic => panic!("fake checker panic for {}", app.id),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// TestContext
// ============================================================================

/// Temp directory, mock server and an engine wired to both.
///
/// Apps live under `<tmp>/Applications`, the Caskroom under `<tmp>/Caskroom`.
/// Appcasts and archives are served by the mock server; the store catalog
/// lookup points at it too.
pub struct TestContext {
    pub tmp: TempDir,
    pub mock_server: MockServer,
    engine: Engine,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_services(None, Arc::new(FakeStoreService::new())).await
    }

    pub async fn with_services(
        package_manager: Option<Arc<dyn PackageManager>>,
        store: Arc<dyn StoreService>,
    ) -> Self {
        let mock_server = MockServer::start().await;
        let tmp = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(tmp.path().join("Applications")).unwrap();
        fs::create_dir_all(tmp.path().join("Caskroom")).unwrap();

        let config = test_config(&mock_server, &tmp);
        let services = Services {
            discovery: Arc::new(
                BundleScanner::new(config.app_dirs.clone())
                    .with_caskroom(tmp.path().join("Caskroom")),
            ),
            http: Arc::new(ReqwestHttpClient::new()),
            store,
            package_manager,
            extractor: Arc::new(SystemExtractor::default()),
            downloader: Downloader::new(),
        };
        let engine = Engine::with_services(config, services);

        Self {
            tmp,
            mock_server,
            engine,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.tmp.path().join("Applications")
    }

    /// URL of a path on the mock server.
    pub fn url(&self, url_path: &str) -> String {
        format!("{}/{}", self.mock_server.uri(), url_path.trim_start_matches('/'))
    }

    /// Feed URL the Sparkle bundle for `id` points at.
    pub fn feed_url(&self, id: &str) -> String {
        self.url(&format!("feeds/{id}.xml"))
    }

    /// Install a bundle whose feed is served by the mock server.
    pub fn install_sparkle_app(&self, spec: &BundleSpec) -> PathBuf {
        let spec = spec.clone().with_feed(&self.feed_url(&spec.id));
        write_app_bundle(&self.apps_dir(), &spec)
    }

    /// Install a bundle linked from the Caskroom under `token`.
    pub fn install_cask_app(&self, spec: &BundleSpec, token: &str) -> PathBuf {
        fs::create_dir_all(
            self.tmp
                .path()
                .join("Caskroom")
                .join(token)
                .join(&spec.release)
                .join(format!("{}.app", spec.name)),
        )
        .unwrap();
        write_app_bundle(&self.apps_dir(), spec)
    }

    /// Serve the appcast for `id`. Relative item URLs resolve against the mock server.
    pub async fn mount_appcast(&self, id: &str, items: &[(&str, &str, &str)]) {
        let resolved: Vec<(String, String, String)> = items
            .iter()
            .map(|(release, build, url)| {
                let url = if url.contains("://") {
                    url.to_string()
                } else {
                    self.url(&format!("downloads/{url}"))
                };
                (release.to_string(), build.to_string(), url)
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = resolved
            .iter()
            .map(|(r, b, u)| (r.as_str(), b.as_str(), u.as_str()))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/feeds/{id}.xml")))
            .respond_with(ResponseTemplate::new(200).set_body_string(appcast(&borrowed)))
            .mount(&self.mock_server)
            .await;
    }

    /// Serve `bytes` as `/downloads/<file_name>`.
    pub async fn mount_download(&self, file_name: &str, bytes: Vec<u8>) {
        mock_archive(&self.mock_server, &format!("/downloads/{file_name}"), bytes).await;
    }

    /// Answer store catalog lookups for `bundle_id`.
    pub async fn mount_store_lookup(&self, bundle_id: &str, track_id: u64, version: &str, notes: &str) {
        mock_catalog_lookup(&self.mock_server, "bundleId", bundle_id, track_id, version, notes).await;
    }

    pub fn mock_server(&self) -> &MockServer {
        &self.mock_server
    }
}

fn test_config(mock_server: &MockServer, tmp: &TempDir) -> EngineConfig {
    EngineConfig {
        scan: ScanConfig {
            concurrency: 4,
            deadline: Duration::from_secs(10),
        },
        app_dirs: vec![tmp.path().join("Applications")],
        caskroom: Some(tmp.path().join("Caskroom")),
        brew: None,
        unzip: None,
        catalog_url: mock_server.uri(),
    }
}

// ============================================================================
// Module tests
// ============================================================================
