use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Channel an installed app receives its updates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "appstore")]
    AppStore,
    #[serde(rename = "homebrew")]
    Homebrew,
    #[serde(rename = "sparkle")]
    Sparkle,
    #[serde(rename = "none")]
    Unknown,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::AppStore => "appstore",
            Source::Homebrew => "homebrew",
            Source::Sparkle => "sparkle",
            Source::Unknown => "none",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application bundle found on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledApp {
    /// Bundle identifier, unique per app
    pub id: String,
    pub name: String,
    pub version: Version,
    pub source: Source,
    /// Path of the `.app` bundle
    pub location: PathBuf,
    /// Appcast URL declared by the bundle (`SUFeedURL`)
    #[serde(default)]
    pub feed_url: Option<String>,
    /// App Store catalog identifier, when already known
    #[serde(default)]
    pub store_item_id: Option<u64>,
    /// Homebrew cask token
    #[serde(default)]
    pub cask_token: Option<String>,
}

impl InstalledApp {
    pub fn new(id: &str, name: &str, version: Version, source: Source, location: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version,
            source,
            location,
            feed_url: None,
            store_item_id: None,
            cask_token: None,
        }
    }

    pub fn with_feed_url(mut self, url: &str) -> Self {
        self.feed_url = Some(url.to_string());
        self
    }

    pub fn with_store_item_id(mut self, item_id: u64) -> Self {
        self.store_item_id = Some(item_id);
        self
    }

    pub fn with_cask_token(mut self, token: &str) -> Self {
        self.cask_token = Some(token.to_string());
        self
    }
}
