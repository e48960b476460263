//! Installs vendor-feed updates by replacing the bundle on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use lt_core::{ArchiveFormat, Error, Source, archive::url_file_name};

use super::{InstallRequest, InstallSession, InstallStrategy};
use crate::download::Downloader;
use crate::traits::ArchiveExtractor;

pub struct SparkleInstaller {
    downloader: Downloader,
    extractor: Arc<dyn ArchiveExtractor>,
}

impl SparkleInstaller {
    pub fn new(downloader: Downloader, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self {
            downloader,
            extractor,
        }
    }
}

#[async_trait]
impl InstallStrategy for SparkleInstaller {
    fn source(&self) -> Source {
        Source::Sparkle
    }

    async fn install(&self, request: &InstallRequest, session: &InstallSession) -> Result<(), Error> {
        let app = &request.app;
        let url = request
            .update
            .as_ref()
            .and_then(|u| u.download_url.as_deref())
            .ok_or_else(|| Error::UpdateInfoUnavailable { id: app.id.clone() })?;

        let file_name = url_file_name(url);
        let format = ArchiveFormat::from_file_name(&file_name)
            .ok_or_else(|| Error::UnsupportedArchiveFormat {
                file_name: file_name.clone(),
            })?;

        // Staged next to the target so the final rename stays on one volume.
        let location = app.location.clone();
        let staging = blocking(&app.id, move || staging_dir(&location)).await?;
        let archive = staging.path().join(format!("update.{}", format.extension()));

        session.downloading(0, None);
        self.downloader
            .download(url, &archive, &|loaded, total| session.downloading(loaded, total))
            .await?;

        session.extracting(0.0);
        let extracted = staging.path().join("extracted");
        let dir = extracted.clone();
        blocking(&app.id, move || {
            std::fs::create_dir(&dir).map_err(|e| Error::ExtractionFailed {
                message: format!("failed to create {}: {}", dir.display(), e),
            })
        })
        .await?;
        self.extractor.extract(&archive, format, &extracted).await?;
        session.extracting(1.0);

        let bundle = blocking(&app.id, move || locate_bundle(&extracted)).await?;
        debug!(app = %app.id, bundle = %bundle.display(), "found replacement bundle");

        session.installing(Some(&format!("Replacing {}", app.location.display())));
        let target = app.location.clone();
        blocking(&app.id, move || replace_bundle(&bundle, &target)).await
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(id: &str, work: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::InstallAborted {
            id: id.to_string(),
            message: format!("filesystem task failed: {}", e),
        })?
}

fn staging_dir(target: &Path) -> Result<tempfile::TempDir, Error> {
    let parent = target.parent().filter(|p| p.is_dir());
    let staged = match parent {
        Some(dir) => tempfile::Builder::new().prefix(".latest-update-").tempdir_in(dir),
        None => tempfile::Builder::new().prefix("latest-update-").tempdir(),
    };

    staged.or_else(|e| {
        debug!(error = %e, "falling back to system temp dir for staging");
        tempfile::Builder::new().prefix("latest-update-").tempdir()
    })
    .map_err(|e| Error::DownloadFailed {
        message: format!("failed to create staging directory: {}", e),
    })
}

/// Find the single application bundle in an extracted archive.
///
/// Bundles are searched at the top level and one folder down. Resource-fork
/// folders (`__MACOSX`) are ignored.
pub fn locate_bundle(root: &Path) -> Result<PathBuf, Error> {
    let bundles: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_entry(|entry| {
            entry.file_name() != "__MACOSX"
                && (entry.depth() <= 1
                    || entry
                        .path()
                        .parent()
                        .is_none_or(|p| p.extension().is_none_or(|ext| ext != "app")))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.path().extension().is_some_and(|ext| ext == "app"))
        .map(|e| e.into_path())
        .collect();

    match bundles.as_slice() {
        [bundle] => Ok(bundle.clone()),
        _ => Err(Error::AmbiguousOrMissingBundle {
            found: bundles.len(),
        }),
    }
}

/// Move `replacement` to `target`, discarding the old bundle.
///
/// Removing the old bundle is best-effort; the move decides success.
pub fn replace_bundle(replacement: &Path, target: &Path) -> Result<(), Error> {
    if target.symlink_metadata().is_ok()
        && let Err(e) = std::fs::remove_dir_all(target)
    {
        warn!(path = %target.display(), error = %e, "failed to remove old bundle");
    }

    std::fs::rename(replacement, target).map_err(|e| Error::ReplaceFailed {
        path: target.display().to_string(),
        message: e.to_string(),
    })
}
