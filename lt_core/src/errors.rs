use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    AppNotFound {
        id: String,
    },
    UnsupportedSource {
        id: String,
        source: String,
    },
    ServiceUnavailable {
        message: String,
    },
    UpdateInfoUnavailable {
        id: String,
    },
    CheckFailed {
        id: String,
        message: String,
    },
    ProcessExitNonZero {
        program: String,
        code: Option<i32>,
    },
    UnsupportedArchiveFormat {
        file_name: String,
    },
    AmbiguousOrMissingBundle {
        found: usize,
    },
    DownloadFailed {
        message: String,
    },
    ExtractionFailed {
        message: String,
    },
    ReplaceFailed {
        path: String,
        message: String,
    },
    InstallInProgress {
        id: String,
    },
    InstallAborted {
        id: String,
        message: String,
    },
    UpToDate {
        id: String,
        version: String,
    },
}

impl Error {
    /// Short machine-friendly name of the error kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AppNotFound { .. } => "app_not_found",
            Error::UnsupportedSource { .. } => "unsupported_source",
            Error::ServiceUnavailable { .. } => "service_unavailable",
            Error::UpdateInfoUnavailable { .. } => "update_info_unavailable",
            Error::CheckFailed { .. } => "check_failed",
            Error::ProcessExitNonZero { .. } => "process_exit_non_zero",
            Error::UnsupportedArchiveFormat { .. } => "unsupported_archive_format",
            Error::AmbiguousOrMissingBundle { .. } => "ambiguous_or_missing_bundle",
            Error::DownloadFailed { .. } => "download_failed",
            Error::ExtractionFailed { .. } => "extraction_failed",
            Error::ReplaceFailed { .. } => "replace_failed",
            Error::InstallInProgress { .. } => "install_in_progress",
            Error::InstallAborted { .. } => "install_aborted",
            Error::UpToDate { .. } => "up_to_date",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AppNotFound { id } => {
                write!(
                    f,
                    "app '{}' not found\n  hint: run 'latest list' to see the bundle identifiers of installed apps",
                    id
                )
            }
            Error::UnsupportedSource { id, source } => {
                write!(
                    f,
                    "app '{}' comes from an unsupported source ({})\n  hint: only App Store, Homebrew and Sparkle apps can be updated",
                    id, source
                )
            }
            Error::ServiceUnavailable { message } => {
                write!(
                    f,
                    "App Store service unavailable: {}\n  hint: update this app from the App Store instead",
                    message
                )
            }
            Error::UpdateInfoUnavailable { id } => {
                write!(f, "no update information available for '{}'", id)
            }
            Error::CheckFailed { id, message } => {
                write!(f, "update check failed for '{}': {}", id, message)
            }
            Error::ProcessExitNonZero { program, code } => {
                match code {
                    Some(code) => write!(f, "'{}' exited with status {}", program, code)?,
                    None => write!(f, "'{}' was terminated by a signal", program)?,
                }
                write!(f, "\n  hint: re-run with --verbose to see the full output")
            }
            Error::UnsupportedArchiveFormat { file_name } => {
                write!(
                    f,
                    "unsupported archive format: '{}'\n  hint: only .zip, .tar.gz and .tar.xz updates can be installed headlessly",
                    file_name
                )
            }
            Error::AmbiguousOrMissingBundle { found } => {
                if *found == 0 {
                    write!(f, "no application bundle found in the update archive")
                } else {
                    write!(
                        f,
                        "update archive contains {} application bundles, expected exactly one",
                        found
                    )
                }
            }
            Error::DownloadFailed { message } => {
                write!(
                    f,
                    "download failed: {}\n  hint: check your internet connection and try again",
                    message
                )
            }
            Error::ExtractionFailed { message } => {
                write!(f, "extraction failed: {}", message)
            }
            Error::ReplaceFailed { path, message } => {
                write!(
                    f,
                    "could not replace '{}': {}\n  hint: the app may be in use or require administrator rights",
                    path, message
                )
            }
            Error::InstallInProgress { id } => {
                write!(f, "an install for '{}' is already in progress", id)
            }
            Error::InstallAborted { id, message } => {
                write!(f, "install of '{}' stopped: {}", id, message)
            }
            Error::UpToDate { id, version } => {
                write!(
                    f,
                    "'{}' is already up to date ({})\n  hint: run 'latest check' to refresh update information",
                    id, version
                )
            }
        }
    }
}

impl std::error::Error for Error {}
