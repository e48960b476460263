//! latest - check and install updates for installed macOS apps.

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::time::Duration;

use lt_io::{Engine, EngineConfig, ScanConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "latest")]
#[command(about = "Check App Store, Homebrew and Sparkle apps for updates and install them")]
#[command(version)]
struct Cli {
    /// Maximum number of update checks in flight
    #[arg(long, env = "LATEST_CONCURRENCY", default_value = "8", global = true)]
    concurrency: usize,

    /// Seconds allowed for a whole scan
    #[arg(long, env = "LATEST_TIMEOUT", default_value = "30", global = true)]
    timeout: u64,

    /// Directory to search for apps (repeatable; defaults to /Applications and ~/Applications)
    #[arg(long = "app-dir", global = true)]
    app_dirs: Vec<PathBuf>,

    /// Homebrew Caskroom used to recognise cask-installed apps
    #[arg(long, env = "LATEST_CASKROOM", global = true)]
    caskroom: Option<PathBuf>,

    /// Path to the brew executable
    #[arg(long, env = "LATEST_BREW", global = true)]
    brew: Option<PathBuf>,

    /// Path to the unzip executable
    #[arg(long, env = "LATEST_UNZIP", global = true)]
    unzip: Option<PathBuf>,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed apps and their update channel
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check every installed app for updates
    Check {
        /// Output every app as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install the available update for one app
    Install {
        /// Bundle identifier of the app
        #[arg(long)]
        id: String,

        /// Print one JSON object per progress change
        #[arg(long)]
        json_stream: bool,
    },
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            scan: ScanConfig {
                concurrency: self.concurrency.max(1),
                deadline: Duration::from_secs(self.timeout),
            },
            app_dirs: self.app_dirs.clone(),
            caskroom: self.caskroom.clone(),
            brew: self.brew.clone(),
            unzip: self.unzip.clone(),
            ..EngineConfig::default()
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "lt_io=info,lt_cli=info",
        2 => "lt_io=debug,lt_cli=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), lt_core::Error> {
    let engine = Engine::new(cli.engine_config());

    match cli.command {
        Commands::List { json } => commands::list::run(&engine, json),
        Commands::Check { json } => commands::check::run(&engine, json).await,
        Commands::Install { id, json_stream } => {
            commands::install::run(&engine, &id, json_stream).await
        }
    }
}
