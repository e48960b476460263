use serde::Serialize;

use crate::app::{InstalledApp, Source};
use crate::errors::Error;
use crate::version::Version;

/// Release notes as delivered by an update source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseNotes {
    Text(String),
    Url(String),
    Encoded(Vec<u8>),
}

impl ReleaseNotes {
    /// Readable rendering for summaries.
    pub fn to_display_string(&self) -> String {
        match self {
            ReleaseNotes::Text(text) => text.trim().to_string(),
            ReleaseNotes::Url(url) => url.clone(),
            ReleaseNotes::Encoded(bytes) => String::from_utf8_lossy(bytes).trim().to_string(),
        }
    }
}

/// A remote version found for an installed app.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub app: InstalledApp,
    pub remote_version: Version,
    pub source: Source,
    pub release_notes: Option<ReleaseNotes>,
    pub download_url: Option<String>,
    pub store_item_id: Option<u64>,
}

impl UpdateRecord {
    pub fn new(app: InstalledApp, remote_version: Version, source: Source) -> Self {
        Self {
            app,
            remote_version,
            source,
            release_notes: None,
            download_url: None,
            store_item_id: None,
        }
    }

    /// Only a strictly newer remote version counts as an update.
    pub fn update_available(&self) -> bool {
        self.app.version.is_older_than(&self.remote_version)
    }
}

/// Result of checking one app.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub app: InstalledApp,
    pub result: Result<UpdateRecord, Error>,
}

impl CheckOutcome {
    pub fn checked(record: UpdateRecord) -> Self {
        Self {
            app: record.app.clone(),
            result: Ok(record),
        }
    }

    pub fn failed(app: InstalledApp, error: Error) -> Self {
        Self {
            app,
            result: Err(error),
        }
    }

    /// Outcome for an app nothing could be learned about.
    pub fn no_information(app: InstalledApp) -> Self {
        let id = app.id.clone();
        Self::failed(app, Error::UpdateInfoUnavailable { id })
    }

    pub fn update(&self) -> Option<&UpdateRecord> {
        self.result.as_ref().ok().filter(|record| record.update_available())
    }
}

/// Serializable per-app line of a scan result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub installed_version: String,
    pub available_version: Option<String>,
    pub source: Source,
    pub changelog: Option<String>,
    pub can_install: bool,
}

impl AppSummary {
    pub fn from_outcome(outcome: &CheckOutcome) -> Self {
        let update = outcome.update();

        Self {
            id: outcome.app.id.clone(),
            name: outcome.app.name.clone(),
            installed_version: outcome.app.version.display_string(),
            available_version: update.map(|u| u.remote_version.display_string()),
            source: outcome.app.source,
            changelog: update
                .and_then(|u| u.release_notes.as_ref())
                .map(ReleaseNotes::to_display_string)
                .filter(|notes| !notes.is_empty()),
            can_install: update.is_some_and(is_installable),
        }
    }
}

fn is_installable(update: &UpdateRecord) -> bool {
    match update.source {
        Source::Homebrew => update.app.cask_token.is_some(),
        Source::AppStore => update.store_item_id.is_some(),
        Source::Sparkle => update
            .download_url
            .as_deref()
            .is_some_and(|url| crate::archive::ArchiveFormat::from_url(url).is_some()),
        Source::Unknown => false,
    }
}
