//! Interactive setup: pick the two directories, save them, optionally
//! register a login item

use crate::capabilities::{platform_autostart, ConfigStore, DirectoryPicker, TerminalPicker};
use crate::startup::StartupError;
use anyhow::Result;
use backtrail_core::WatchPaths;
use owo_colors::OwoColorize;
use std::io;

pub fn run(autostart: bool, config_store: &dyn ConfigStore) -> Result<()> {
    let stdin = io::stdin();
    let mut picker = TerminalPicker::new(stdin.lock(), io::stdout());
    let paths = choose_paths(&mut picker, config_store)?;

    println!(
        "{} {} {} {}",
        "✓".green(),
        paths.source.display(),
        "→".dimmed(),
        paths.destination.display()
    );
    println!("{} {}", "Saved to".dimmed(), config_store.location().display().dimmed());

    if autostart {
        match platform_autostart(config_store.location())? {
            Some(item) if item.is_registered() => println!("{}", "Already starts on login".dimmed()),
            Some(item) => {
                let entry = item.register()?;
                println!("{} starts on login ({})", "✓".green(), entry.display());
            }
            None => println!("{}", "Starting on login is not supported on this platform".yellow()),
        }
    }

    println!("\nRun {} to start backing up.", "backtrail watch".cyan());
    Ok(())
}

/// Ask for both directories, validate them and persist the result
pub fn choose_paths(picker: &mut dyn DirectoryPicker, config_store: &dyn ConfigStore) -> Result<WatchPaths> {
    let mut config = config_store.load().map_err(StartupError::from)?;

    let source = picker
        .pick("Directory to watch", config.paths.source.as_deref())?
        .ok_or(StartupError::MissingSource)?;
    let destination = picker
        .pick("Directory to back up to", config.paths.destination.as_deref())?
        .ok_or(StartupError::MissingDestination)?;

    let paths = WatchPaths::resolve(&source, &destination).map_err(StartupError::from)?;

    config.paths.source = Some(paths.source.clone());
    config.paths.destination = Some(paths.destination.clone());
    config_store.persist(&config)?;
    Ok(paths)
}
