//! Display utilities for progress bars and formatting helpers.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use lt_core::{AppSummary, InstalledApp};
use lt_io::{InstallProgress, InstallState};

/// Progress styles used while installing.
pub struct ProgressStyles {
    pub download: ProgressStyle,
    pub fraction: ProgressStyle,
    pub spinner: ProgressStyle,
    pub done: ProgressStyle,
}

impl Default for ProgressStyles {
    fn default() -> Self {
        Self {
            download: ProgressStyle::default_bar()
                .template(
                    "    {prefix:<16} {bar:25.cyan/dim} {bytes:>10}/{total_bytes:<10} {eta:>6}",
                )
                .unwrap()
                .progress_chars("━━╸"),
            fraction: ProgressStyle::default_bar()
                .template("    {prefix:<16} {bar:25.cyan/dim} {percent:>3}% {msg}")
                .unwrap()
                .progress_chars("━━╸"),
            spinner: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            done: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {msg}")
                .unwrap(),
        }
    }
}

/// Renders install progress as a single progress bar.
pub struct InstallRenderer {
    bar: ProgressBar,
    styles: ProgressStyles,
    phase: &'static str,
}

impl InstallRenderer {
    pub fn new(name: &str) -> Self {
        let styles = ProgressStyles::default();
        let bar = ProgressBar::new_spinner();
        bar.set_style(styles.spinner.clone());
        bar.set_prefix(name.to_string());
        bar.set_message("preparing...");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            styles,
            phase: "initializing",
        }
    }

    pub fn update(&mut self, progress: &InstallProgress) {
        let entering = self.phase != progress.state.name();
        self.phase = progress.state.name();

        match &progress.state {
            InstallState::Initializing => {}
            InstallState::Downloading { loaded, total } => {
                if let Some(total) = total
                    && (entering || self.bar.length() != Some(*total))
                {
                    self.bar.set_length(*total);
                    self.bar.set_style(self.styles.download.clone());
                }
                if total.is_none() {
                    self.bar
                        .set_message(format!("downloading... {}", format_bytes(*loaded)));
                }
                self.bar.set_position(*loaded);
            }
            InstallState::Extracting { fraction } => {
                if entering {
                    self.bar.set_style(self.styles.fraction.clone());
                    self.bar.set_length(100);
                    self.bar.set_message("extracting...");
                }
                self.bar.set_position((fraction * 100.0).round() as u64);
            }
            InstallState::Installing { message } => {
                if entering {
                    self.bar.set_style(self.styles.spinner.clone());
                }
                self.bar
                    .set_message(message.clone().unwrap_or_else(|| "installing...".to_string()));
            }
            InstallState::Completed => {
                self.bar.set_style(self.styles.done.clone());
                self.bar
                    .finish_with_message(format!("{} updated", style("✓").green()));
            }
            InstallState::Failed(_) => {
                self.bar.set_style(self.styles.done.clone());
                self.bar.finish_with_message(format!("{} failed", style("✗").red()));
            }
        }
    }
}

/// One line of `install --json-stream` output.
#[derive(Debug, Serialize)]
pub struct ProgressLine<'a> {
    pub id: &'a str,
    pub state: &'static str,
    pub progress: Option<f64>,
    pub message: Option<String>,
}

pub fn progress_json_line(progress: &InstallProgress) -> String {
    let line = ProgressLine {
        id: &progress.app_id,
        state: progress.state.name(),
        progress: progress.state.fraction(),
        message: progress.state.message(),
    };
    serde_json::to_string(&line).unwrap_or_default()
}

/// Pretty-print `value` to stdout, exiting if it cannot be encoded.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!(
                "{} Failed to serialize JSON: {}",
                style("error:").red().bold(),
                e
            );
            std::process::exit(1);
        }
    }
}

/// Installed app as printed by `list --json`.
///
/// Same fields as a check summary so consumers parse both outputs alike.
/// Nothing is checked while listing, so there is never an available version.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedApp<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub installed_version: String,
    pub available_version: Option<String>,
    pub source: lt_core::Source,
    pub changelog: Option<String>,
    pub can_install: bool,
    pub path: String,
}

impl<'a> From<&'a InstalledApp> for ListedApp<'a> {
    fn from(app: &'a InstalledApp) -> Self {
        Self {
            id: &app.id,
            name: &app.name,
            installed_version: app.version.display_string(),
            available_version: None,
            source: app.source,
            changelog: None,
            can_install: false,
            path: app.location.display().to_string(),
        }
    }
}

pub fn format_installed_line(app: &InstalledApp) -> String {
    format!(
        "{} {} {}",
        style(&app.name).bold(),
        app.version.display_string(),
        style(format!("({})", app.source)).dim()
    )
}

pub fn format_update_line(summary: &AppSummary) -> String {
    let available = summary.available_version.as_deref().unwrap_or("?");
    let marker = if summary.can_install {
        style("↑").green().to_string()
    } else {
        style("↑").yellow().to_string()
    };

    format!(
        "{} {} {} → {} {}",
        marker,
        style(&summary.name).bold(),
        summary.installed_version,
        style(available).green(),
        style(format!("({})", summary.source)).dim()
    )
}

/// Format bytes into a human-readable string (e.g., "1.5 GB").
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_core::{Error, Source, Version};
    use std::path::PathBuf;

    fn progress(state: InstallState) -> InstallProgress {
        InstallProgress {
            app_id: "com.example.app".to_string(),
            source: Source::Sparkle,
            state,
        }
    }

    #[test]
    fn json_line_for_download() {
        let line = progress_json_line(&progress(InstallState::Downloading {
            loaded: 50,
            total: Some(200),
        }));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["id"], "com.example.app");
        assert_eq!(value["state"], "downloading");
        assert_eq!(value["progress"], 0.25);
        assert!(value["message"].is_null());
    }

    #[test]
    fn json_line_for_failure_carries_message() {
        let line = progress_json_line(&progress(InstallState::Failed(Error::AmbiguousOrMissingBundle {
            found: 0,
        })));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["state"], "error");
        assert!(value["message"].as_str().unwrap().contains("no application bundle"));
    }

    #[test]
    fn json_line_is_single_line() {
        let line = progress_json_line(&progress(InstallState::Installing {
            message: Some("==> Upgrading".into()),
        }));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn listed_app_serializes_camel_case() {
        let app = InstalledApp::new(
            "com.example.app",
            "Example",
            Version::new(Some("1.2"), Some("45")),
            Source::Homebrew,
            PathBuf::from("/Applications/Example.app"),
        );
        let value = serde_json::to_value(ListedApp::from(&app)).unwrap();

        assert_eq!(value["installedVersion"], "1.2 (45)");
        assert_eq!(value["source"], "homebrew");
        assert_eq!(value["path"], "/Applications/Example.app");
    }

    #[test]
    fn listed_app_has_summary_fields() {
        let app = InstalledApp::new(
            "com.example.app",
            "Example",
            Version::release("1.2"),
            Source::Sparkle,
            PathBuf::from("/Applications/Example.app"),
        );
        let listed = serde_json::to_value(ListedApp::from(&app)).unwrap();

        let summary = serde_json::to_value(AppSummary {
            id: "com.example.app".into(),
            name: "Example".into(),
            installed_version: "1.2".into(),
            available_version: None,
            source: Source::Sparkle,
            changelog: None,
            can_install: false,
        })
        .unwrap();
        for (key, expected) in summary.as_object().unwrap() {
            assert_eq!(&listed[key], expected, "field {key}");
        }
        assert!(listed["availableVersion"].is_null());
        assert!(listed["changelog"].is_null());
        assert_eq!(listed["canInstall"], false);
    }

    #[test]
    fn update_line_mentions_versions() {
        let summary = AppSummary {
            id: "com.example.app".into(),
            name: "Example".into(),
            installed_version: "1.0".into(),
            available_version: Some("2.0".into()),
            source: Source::Sparkle,
            changelog: None,
            can_install: true,
        };
        let line = console::strip_ansi_codes(&format_update_line(&summary)).to_string();
        assert!(line.contains("Example 1.0 → 2.0"));
    }

    #[test]
    fn renderer_survives_full_lifecycle() {
        let mut renderer = InstallRenderer::new("Example");
        for state in [
            InstallState::Initializing,
            InstallState::Downloading { loaded: 0, total: None },
            InstallState::Downloading { loaded: 10, total: Some(100) },
            InstallState::Extracting { fraction: 0.5 },
            InstallState::Installing { message: None },
            InstallState::Completed,
        ] {
            renderer.update(&progress(state));
        }
        assert!(renderer.bar.is_finished());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1024 * 1024 * 3 / 2), "1.5 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }
}
