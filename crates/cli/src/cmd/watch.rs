//! Watch a source tree and record every change as a snapshot
//!
//! Startup order matters:
//! 1. Resolve and validate paths, confirm a new destination (nothing written yet)
//! 2. Listen for stop signals, so a stop from here on is always a clean one
//! 3. Subscribe to the source, so changes made during the baseline are queued
//! 4. Initialize the destination history and take its lock
//! 5. Record the baseline snapshot on first use
//! 6. Run the watch loop on a blocking thread until it ends or is stopped

use crate::capabilities::ConfigStore;
use crate::locks::DestinationLock;
use crate::startup::{confirm_destination, resolve_paths, StartupError};
use crate::util::remember_paths;
use anyhow::{Context, Result};
use backtrail_core::{PathTranslator, ShutdownToken};
use backtrail_store::{GitStore, SnapshotStore};
use backtrail_watcher::{driver, Baseline, IgnoreRules, LoopExit, Reconciler, Watcher};
use owo_colors::OwoColorize;
use std::io;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Arguments of `backtrail watch`
pub struct WatchArgs {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub yes: bool,
}

pub async fn run(args: WatchArgs, config_store: &dyn ConfigStore) -> Result<()> {
    let mut config = config_store.load().map_err(StartupError::from)?;
    let paths = resolve_paths(args.source.as_deref(), args.destination.as_deref(), &config)?;

    if !args.yes && paths.destination_needs_confirmation(config.paths.destination.as_deref()) {
        let stdin = io::stdin();
        let confirmed = confirm_destination(&paths.destination, stdin.lock(), io::stdout())
            .context("Failed to read confirmation")?;
        if !confirmed {
            return Err(StartupError::Declined(paths.destination).into());
        }
    }
    remember_paths(config_store, &mut config, paths.source.clone(), paths.destination.clone())
        .context("Failed to save configuration")?;

    let token = ShutdownToken::new();
    let listener = spawn_signal_listener(token.clone()).context("Failed to listen for shutdown signals")?;

    let watcher = Watcher::new(&paths.source)
        .with_context(|| format!("Failed to watch {}", paths.source.display()))?;

    let mut store = GitStore::new(&paths.destination);
    store
        .initialize()
        .with_context(|| format!("Failed to initialize history in {}", paths.destination.display()))?;
    let lock = DestinationLock::acquire(&store.git_dir())?;
    debug!(lock = %lock.path().display(), "acquired destination lock");

    let ignore = IgnoreRules::load(&paths.source, config.ignore.clone()).context("Failed to load ignore rules")?;
    debug!(sources = ignore.active_sources(), "loaded ignore rules");

    let translator = PathTranslator::new(&paths.source, &paths.destination, config.watch.layout);
    let mut reconciler = Reconciler::new(translator, store, ignore);

    match reconciler
        .establish_baseline(config.watch.baseline_sync, &token)
        .context("Failed to record baseline snapshot")?
    {
        Baseline::Created {
            id,
            files_copied,
            files_failed,
        } => {
            println!("{} baseline {} ({} files)", "✓".green(), id.short().yellow(), files_copied);
            if files_failed > 0 {
                println!(
                    "{} {} files could not be copied (see log)",
                    "warning:".yellow().bold(),
                    files_failed
                );
            }
        }
        Baseline::Interrupted { files_copied } => {
            debug!(files = files_copied, "stopped during baseline");
        }
        Baseline::Existing => {}
    }

    if !token.is_cancelled() {
        println!(
            "{} {} {} {}",
            "Watching".green().bold(),
            paths.source.display(),
            "→".dimmed(),
            paths.destination.display()
        );
    }

    let notices = watcher.notices().clone();
    let loop_token = token.clone();
    let report = tokio::task::spawn_blocking(move || driver::run(&mut reconciler, &notices, &loop_token))
        .await
        .context("Watch loop panicked")?;
    listener.abort();

    if let Err(err) = watcher.stop() {
        debug!(error = %err, "failed to unwatch source");
    }
    drop(lock);

    match report.exit {
        LoopExit::Stopped => println!("{} {} snapshots recorded", "Stopped.".bold(), report.stats.commits),
        LoopExit::SourceEnded => println!(
            "{} {} snapshots recorded",
            "Source is no longer watchable.".yellow(),
            report.stats.commits
        ),
    }
    Ok(())
}

/// Cancel `token` on the first SIGTERM or SIGINT (Ctrl-C elsewhere)
///
/// The handlers are registered before this returns, replacing the default
/// terminate action for the rest of the process.
fn spawn_signal_listener(token: ShutdownToken) -> Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            info!("stop requested");
            token.cancel();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("stop requested");
                    token.cancel();
                }
                Err(err) => debug!(error = %err, "failed to listen for Ctrl-C"),
            }
        }))
    }
}
