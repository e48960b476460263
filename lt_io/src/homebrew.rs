//! Homebrew cask driver.
//!
//! Version lookups use `brew info --cask --json=v2`, upgrades run
//! `brew upgrade --cask` with stdout and stderr streamed line by line.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use lt_core::{Error, Version};

use crate::traits::PackageManager;

const BREW_CANDIDATES: &[&str] = &[
    "/opt/homebrew/bin/brew",
    "/usr/local/bin/brew",
    "/home/linuxbrew/.linuxbrew/bin/brew",
];

/// `brew` invoked as an external process.
#[derive(Debug, Clone)]
pub struct Homebrew {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Homebrew {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Run `program` with `leading_args` in front of every brew subcommand,
    /// e.g. a wrapper script.
    pub fn with_command(program: impl Into<PathBuf>, leading_args: &[&str]) -> Self {
        Self {
            program: program.into(),
            leading_args: leading_args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Find brew in its standard install locations.
    pub fn locate() -> Option<Self> {
        BREW_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
            .map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .env("HOMEBREW_NO_AUTO_UPDATE", "1")
            .env("HOMEBREW_NO_ENV_HINTS", "1")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PackageManager for Homebrew {
    async fn latest_version(&self, token: &str) -> Result<Version, Error> {
        let output = self
            .command(&["info", "--cask", "--json=v2", token])
            .output()
            .await
            .map_err(|e| Error::CheckFailed {
                id: token.to_string(),
                message: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            debug!(
                token,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "brew info failed"
            );
            return Err(Error::ProcessExitNonZero {
                program: "brew".to_string(),
                code: output.status.code(),
            });
        }

        parse_cask_version(token, &output.stdout)
    }

    async fn upgrade(
        &self,
        token: &str,
        on_output: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<(), Error> {
        let mut child = self
            .command(&["upgrade", "--cask", token])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::InstallAborted {
                id: token.to_string(),
                message: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        let (tx, mut lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        while let Some(line) = lines.recv().await {
            let line = line.trim();
            if !line.is_empty() {
                on_output(line);
            }
        }

        let status = child.wait().await.map_err(|e| Error::InstallAborted {
            id: token.to_string(),
            message: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::ProcessExitNonZero {
                program: "brew".to_string(),
                code: status.code(),
            })
        }
    }
}

fn forward_lines<R>(pipe: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[derive(Deserialize)]
struct CaskInfoResponse {
    #[serde(default)]
    casks: Vec<CaskInfo>,
}

#[derive(Deserialize)]
struct CaskInfo {
    token: String,
    version: String,
}

/// Extract the version of `token` from `brew info --json=v2` output.
///
/// Casks encode a build number after a comma (`1.2.3,456`). The special
/// version `latest` carries no information and yields an unknown version.
pub fn parse_cask_version(token: &str, json: &[u8]) -> Result<Version, Error> {
    let response: CaskInfoResponse =
        serde_json::from_slice(json).map_err(|e| Error::CheckFailed {
            id: token.to_string(),
            message: format!("invalid brew info output: {}", e),
        })?;

    let cask = response
        .casks
        .iter()
        .find(|c| c.token == token)
        .or_else(|| response.casks.first())
        .ok_or_else(|| Error::UpdateInfoUnavailable {
            id: token.to_string(),
        })?;

    if cask.version.eq_ignore_ascii_case("latest") {
        return Ok(Version::default());
    }

    let (release, build) = match cask.version.split_once(',') {
        Some((release, build)) => (release, Some(build)),
        None => (cask.version.as_str(), None),
    };
    Ok(Version::new(Some(release), build))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn info_json(token: &str, version: &str) -> String {
        format!(
            r#"{{"formulae":[],"casks":[{{"token":"{token}","full_token":"{token}","name":["Example"],"version":"{version}","installed":"1.0"}}]}}"#
        )
    }

    #[test]
    fn parses_plain_version() {
        let v = parse_cask_version("firefox", info_json("firefox", "121.0").as_bytes()).unwrap();
        assert_eq!(v, Version::release("121.0"));
    }

    #[test]
    fn splits_build_after_comma() {
        let v = parse_cask_version("iterm2", info_json("iterm2", "3.4.23,20231215").as_bytes())
            .unwrap();
        assert_eq!(v.release_version(), Some("3.4.23"));
        assert_eq!(v.build_version(), Some("20231215"));
    }

    #[test]
    fn latest_is_unknown() {
        let v = parse_cask_version("chrome", info_json("chrome", "latest").as_bytes()).unwrap();
        assert!(v.is_unknown());
    }

    #[test]
    fn empty_casks_is_unavailable() {
        let err = parse_cask_version("gone", br#"{"formulae":[],"casks":[]}"#).unwrap_err();
        assert!(matches!(err, Error::UpdateInfoUnavailable { .. }));
    }

    #[test]
    fn garbage_is_check_failure() {
        let err = parse_cask_version("x", b"Error: No available cask").unwrap_err();
        assert!(matches!(err, Error::CheckFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn upgrade_streams_combined_output() {
        let brew = Homebrew::with_command(
            "/bin/sh",
            &["-c", "echo \"==> Upgrading $3\"; echo 'warning: slow' >&2; exit 0", "brew"],
        );
        let lines = Mutex::new(Vec::new());

        brew.upgrade("example", &|line| lines.lock().unwrap().push(line.to_string()))
            .await
            .unwrap();

        let lines = lines.into_inner().unwrap();
        assert!(lines.contains(&"==> Upgrading example".to_string()));
        assert!(lines.contains(&"warning: slow".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn upgrade_reports_exit_status() {
        let brew = Homebrew::with_command("/bin/sh", &["-c", "echo failing; exit 3", "brew"]);

        let err = brew.upgrade("example", &|_| {}).await.unwrap_err();
        assert_eq!(
            err,
            Error::ProcessExitNonZero {
                program: "brew".to_string(),
                code: Some(3)
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn latest_version_reads_json_from_process() {
        let script = format!("printf '%s' '{}'", info_json("example", "2.5,77"));
        let brew = Homebrew::with_command("/bin/sh", &["-c", &script, "brew"]);

        let v = brew.latest_version("example").await.unwrap();
        assert_eq!(v, Version::new(Some("2.5"), Some("77")));
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let brew = Homebrew::new("/nonexistent/brew");
        let err = brew.latest_version("example").await.unwrap_err();
        assert!(matches!(err, Error::CheckFailed { .. }));
    }
}
