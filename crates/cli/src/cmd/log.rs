//! List recent snapshots

use crate::capabilities::ConfigStore;
use crate::startup::StartupError;
use crate::util::format_relative_time;
use anyhow::{Context, Result};
use backtrail_store::{GitStore, StoreError};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run(destination: Option<PathBuf>, limit: usize, config_store: &dyn ConfigStore) -> Result<()> {
    let destination = match destination {
        Some(destination) => destination,
        None => config_store
            .load()
            .map_err(StartupError::from)?
            .paths
            .destination
            .ok_or(StartupError::MissingDestination)?,
    };

    let store = match GitStore::open(&destination) {
        Ok(store) => store,
        Err(StoreError::NotInitialized(_)) => {
            println!("{}", "No snapshots yet".dimmed());
            return Ok(());
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Failed to open {}", destination.display())))
        }
    };

    let entries = store.history(limit).context("Failed to read snapshot history")?;
    if entries.is_empty() {
        println!("{}", "No snapshots yet".dimmed());
        return Ok(());
    }

    println!("{} {}\n", "Snapshots in".bold(), destination.display());
    for entry in &entries {
        let files = match entry.files_changed {
            1 => "1 file".to_string(),
            n => format!("{n} files"),
        };
        let path = entry.first_path.as_deref().unwrap_or("");
        println!(
            "{} {} - {} {}",
            entry.id.short().yellow(),
            format_relative_time(entry.time_unix_secs).dimmed(),
            files,
            path.cyan()
        );
    }

    let total = store.snapshot_count()?;
    if total > entries.len() {
        println!("\n{}", format!("… {} older snapshots", total - entries.len()).dimmed());
    }
    Ok(())
}
