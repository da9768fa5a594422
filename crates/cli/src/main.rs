//! backtrail CLI - backtrail command

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod capabilities;
mod cmd;
mod locks;
mod logging;
mod startup;
mod util;

use capabilities::FileConfigStore;
use startup::StartupError;

/// backtrail - Mirror a directory into a git snapshot history as it changes
#[derive(Parser)]
#[command(name = "backtrail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/backtrail/config.toml)
    #[arg(long, global = true, env = "BACKTRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch SOURCE and record every change as a snapshot in DESTINATION
    Watch {
        /// Directory to watch (default: configured source)
        source: Option<PathBuf>,
        /// Directory holding the snapshot history (default: configured destination)
        destination: Option<PathBuf>,
        /// Don't ask before backing up into an existing, previously unused destination
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Choose source and destination interactively and save them
    Setup {
        /// Also start `backtrail watch` on login
        #[arg(long)]
        autostart: bool,
    },
    /// Show recent snapshots
    Log {
        /// Destination to read (default: configured destination)
        destination: Option<PathBuf>,
        /// Number of snapshots to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show the saved configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,
        /// Write a default configuration file if none exists
        #[arg(long, conflicts_with = "path")]
        init: bool,
        /// Print an annotated example configuration
        #[arg(long, conflicts_with_all = ["path", "init"])]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            let code = err
                .downcast_ref::<StartupError>()
                .map(StartupError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_store = match cli.config {
        Some(path) => FileConfigStore::new(path),
        None => FileConfigStore::default_location().map_err(StartupError::from)?,
    };

    match cli.command {
        Commands::Watch { source, destination, yes } => {
            let args = cmd::watch::WatchArgs { source, destination, yes };
            cmd::watch::run(args, &config_store).await
        }
        Commands::Setup { autostart } => cmd::setup::run(autostart, &config_store),
        Commands::Log { destination, limit } => cmd::log::run(destination, limit, &config_store),
        Commands::Config { path, init, example } => {
            let args = cmd::config::ConfigArgs { path, init, example };
            cmd::config::run(args, &config_store)
        }
    }
}
