use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tar::Archive;
use tokio::process::Command;
use xz2::read::XzDecoder;

use lt_core::{ArchiveFormat, Error};

use crate::traits::ArchiveExtractor;

/// Extracts `.zip` archives with the system `unzip` and tarballs in-process.
#[derive(Debug, Clone)]
pub struct SystemExtractor {
    unzip: PathBuf,
}

impl SystemExtractor {
    pub fn new(unzip: impl Into<PathBuf>) -> Self {
        Self {
            unzip: unzip.into(),
        }
    }

    pub fn unzip_program(&self) -> &Path {
        &self.unzip
    }

    async fn unzip(&self, archive: &Path, dest: &Path) -> Result<(), Error> {
        let output = Command::new(&self.unzip)
            .arg("-q")
            .arg("-o")
            .arg(archive)
            .arg("-d")
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ExtractionFailed {
                message: format!("failed to run {}: {}", self.unzip.display(), e),
            })?;

        if !output.status.success() {
            return Err(Error::ExtractionFailed {
                message: format!(
                    "unzip exited with status {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl Default for SystemExtractor {
    fn default() -> Self {
        let system = Path::new("/usr/bin/unzip");
        if system.is_file() {
            Self::new(system)
        } else {
            Self::new("unzip")
        }
    }
}

#[async_trait]
impl ArchiveExtractor for SystemExtractor {
    async fn extract(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<(), Error> {
        match format {
            ArchiveFormat::Zip => self.unzip(archive, dest).await,
            ArchiveFormat::TarGz | ArchiveFormat::TarXz => {
                let archive = archive.to_path_buf();
                let dest = dest.to_path_buf();
                tokio::task::spawn_blocking(move || extract_tarball(&archive, format, &dest))
                    .await
                    .map_err(|e| Error::ExtractionFailed {
                        message: format!("extraction task failed: {}", e),
                    })?
            }
        }
    }
}

/// Unpack a gzip or xz compressed tarball into `dest`.
pub fn extract_tarball(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<(), Error> {
    let file = File::open(archive).map_err(|e| Error::ExtractionFailed {
        message: format!("failed to open {}: {}", archive.display(), e),
    })?;

    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(file)),
        ArchiveFormat::Zip => {
            return Err(Error::ExtractionFailed {
                message: "zip archives are not tarballs".to_string(),
            });
        }
    };

    let mut tarball = Archive::new(reader);
    tarball.set_preserve_permissions(true);
    tarball.unpack(dest).map_err(|e| Error::ExtractionFailed {
        message: format!("failed to unpack {}: {}", archive.display(), e),
    })
}
