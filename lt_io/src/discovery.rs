//! Enumerates installed application bundles.
//!
//! Each `.app` under the scanned roots is read from its `Info.plist` and
//! tagged with the channel it most likely updates through:
//! - a `_MASReceipt` marks an App Store app
//! - a matching bundle in the Homebrew Caskroom marks a cask
//! - an `SUFeedURL` key marks a Sparkle app

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use lt_core::{InstalledApp, Source, Version};

pub trait AppDiscovery: Send + Sync {
    fn list_installed_apps(&self) -> Vec<InstalledApp>;
}

/// Walks application directories on disk.
pub struct BundleScanner {
    roots: Vec<PathBuf>,
    caskroom: Option<PathBuf>,
}

impl BundleScanner {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            caskroom: None,
        }
    }

    pub fn with_caskroom(mut self, caskroom: PathBuf) -> Self {
        self.caskroom = Some(caskroom);
        self
    }

    /// `/Applications` and `~/Applications`, plus the first Caskroom found.
    pub fn system() -> Self {
        let mut roots = vec![PathBuf::from("/Applications")];
        if let Some(home) = std::env::var_os("HOME") {
            roots.push(PathBuf::from(home).join("Applications"));
        }

        let caskroom = ["/opt/homebrew/Caskroom", "/usr/local/Caskroom"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_dir());

        Self { roots, caskroom }
    }

    fn read_bundle(&self, bundle: &Path, casks: &HashMap<String, String>) -> Option<InstalledApp> {
        let plist_path = bundle.join("Contents/Info.plist");
        let contents = match std::fs::read(&plist_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %plist_path.display(), error = %e, "skipping bundle without Info.plist");
                return None;
            }
        };

        if contents.starts_with(b"bplist") {
            warn!(path = %plist_path.display(), "binary property lists are not supported");
            return None;
        }

        let plist = String::from_utf8_lossy(&contents);
        let id = plist_string(&plist, "CFBundleIdentifier")?;

        let file_name = bundle.file_name()?.to_string_lossy().to_string();
        let name = bundle
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .or_else(|| plist_string(&plist, "CFBundleName"))
            .unwrap_or_else(|| id.clone());

        let version = Version::new(
            plist_string(&plist, "CFBundleShortVersionString").as_deref(),
            plist_string(&plist, "CFBundleVersion").as_deref(),
        );
        let feed_url = plist_string(&plist, "SUFeedURL");

        let source = if bundle.join("Contents/_MASReceipt/receipt").is_file() {
            Source::AppStore
        } else if casks.contains_key(&file_name) {
            Source::Homebrew
        } else if feed_url.is_some() {
            Source::Sparkle
        } else {
            Source::Unknown
        };

        let mut app = InstalledApp::new(&id, &name, version, source, bundle.to_path_buf());
        app.feed_url = feed_url;
        app.cask_token = casks.get(&file_name).cloned();
        Some(app)
    }
}

impl AppDiscovery for BundleScanner {
    fn list_installed_apps(&self) -> Vec<InstalledApp> {
        let casks = self
            .caskroom
            .as_deref()
            .map(caskroom_bundles)
            .unwrap_or_default();

        let mut apps: Vec<InstalledApp> = self
            .roots
            .iter()
            .flat_map(|root| find_bundles(root))
            .filter_map(|bundle| self.read_bundle(&bundle, &casks))
            .collect();

        apps.sort_by_key(|a| a.name.to_lowercase());
        apps.dedup_by(|a, b| a.location == b.location);
        apps
    }
}

fn is_app_bundle(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "app")
}

/// `.app` directories directly under `root` or one folder deeper.
fn find_bundles(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() <= 1 || entry.path().parent().is_none_or(|p| !is_app_bundle(p))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && is_app_bundle(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Map of bundle file name (e.g. `Firefox.app`) to cask token.
///
/// Caskroom layout is `<caskroom>/<token>/<version>/<Bundle>.app`.
fn caskroom_bundles(caskroom: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for entry in WalkDir::new(caskroom)
        .min_depth(3)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !is_app_bundle(entry.path()) {
            continue;
        }
        let token = entry
            .path()
            .parent()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().to_string());
        if let (Some(token), Some(file_name)) = (token, entry.path().file_name()) {
            map.insert(file_name.to_string_lossy().to_string(), token);
        }
    }

    map
}

fn plist_string(plist: &str, key: &str) -> Option<String> {
    static KEY_VALUE: OnceLock<Regex> = OnceLock::new();
    let re = KEY_VALUE.get_or_init(|| {
        Regex::new(r"<key>\s*([^<]+?)\s*</key>\s*<string>([^<]*)</string>").expect("valid plist pattern")
    });

    re.captures_iter(plist)
        .find(|c| &c[1] == key)
        .map(|c| c[2].trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BundleSpec, write_app_bundle};
    use tempfile::TempDir;

    #[test]
    fn classifies_bundles_by_channel() {
        let tmp = TempDir::new().unwrap();
        let apps_dir = tmp.path().join("Applications");
        let caskroom = tmp.path().join("Caskroom");

        write_app_bundle(&apps_dir, &BundleSpec::new("Notes Plus", "com.example.notes", "3.1").with_store_receipt());
        write_app_bundle(&apps_dir, &BundleSpec::new("Firefox", "org.mozilla.firefox", "120.0"));
        std::fs::create_dir_all(caskroom.join("firefox/120.0/Firefox.app")).unwrap();
        write_app_bundle(
            &apps_dir,
            &BundleSpec::new("Sketchy", "com.example.sketchy", "1.0")
                .with_build("100")
                .with_feed("https://example.com/appcast.xml"),
        );
        write_app_bundle(&apps_dir, &BundleSpec::new("Plain", "com.example.plain", "0.1"));

        let apps = BundleScanner::new(vec![apps_dir])
            .with_caskroom(caskroom)
            .list_installed_apps();

        let by_id: HashMap<_, _> = apps.iter().map(|a| (a.id.as_str(), a)).collect();
        assert_eq!(by_id["com.example.notes"].source, Source::AppStore);
        assert_eq!(by_id["org.mozilla.firefox"].source, Source::Homebrew);
        assert_eq!(by_id["org.mozilla.firefox"].cask_token.as_deref(), Some("firefox"));
        assert_eq!(by_id["com.example.sketchy"].source, Source::Sparkle);
        assert_eq!(
            by_id["com.example.sketchy"].feed_url.as_deref(),
            Some("https://example.com/appcast.xml")
        );
        assert_eq!(
            by_id["com.example.sketchy"].version,
            Version::new(Some("1.0"), Some("100"))
        );
        assert_eq!(by_id["com.example.plain"].source, Source::Unknown);
    }

    #[test]
    fn results_are_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        write_app_bundle(tmp.path(), &BundleSpec::new("zeta", "com.example.zeta", "1"));
        write_app_bundle(tmp.path(), &BundleSpec::new("Alpha", "com.example.alpha", "1"));

        let names: Vec<_> = BundleScanner::new(vec![tmp.path().to_path_buf()])
            .list_installed_apps()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "zeta"]);
    }

    #[test]
    fn nested_folders_are_scanned_but_not_bundle_internals() {
        let tmp = TempDir::new().unwrap();
        write_app_bundle(&tmp.path().join("Utilities"), &BundleSpec::new("Tool", "com.example.tool", "1"));
        write_app_bundle(
            &tmp.path().join("Outer.app/Contents"),
            &BundleSpec::new("Helper", "com.example.helper", "1"),
        );
        write_app_bundle(tmp.path(), &BundleSpec::new("Outer", "com.example.outer", "1"));

        let ids: Vec<_> = BundleScanner::new(vec![tmp.path().to_path_buf()])
            .list_installed_apps()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert!(ids.contains(&"com.example.tool".to_string()));
        assert!(ids.contains(&"com.example.outer".to_string()));
        assert!(!ids.contains(&"com.example.helper".to_string()));
    }

    #[test]
    fn bundles_without_identifier_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let bundle = tmp.path().join("Broken.app/Contents");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Info.plist"), "<plist><dict></dict></plist>").unwrap();

        assert!(BundleScanner::new(vec![tmp.path().to_path_buf()]).list_installed_apps().is_empty());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let apps = BundleScanner::new(vec![PathBuf::from("/nonexistent/Applications")]).list_installed_apps();
        assert!(apps.is_empty());
    }

    #[test]
    fn plist_lookup_matches_exact_key() {
        let plist = "<key>CFBundleVersionX</key><string>no</string>\n<key>CFBundleVersion</key>\n\t<string> 42 </string>";
        assert_eq!(plist_string(plist, "CFBundleVersion").as_deref(), Some("42"));
        assert_eq!(plist_string(plist, "SUFeedURL"), None);
    }
}
