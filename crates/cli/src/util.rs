//! Shared utilities for CLI commands

use backtrail_core::{Config, ConfigError};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::capabilities::ConfigStore;

/// Format a Unix timestamp (seconds) as relative time ("2 hours ago")
pub fn format_relative_time(ts_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    format_elapsed(now - ts_secs)
}

fn format_elapsed(seconds: i64) -> String {
    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Save `config` when the session's paths differ from the stored ones
pub fn remember_paths(
    store: &dyn ConfigStore,
    config: &mut Config,
    source: PathBuf,
    destination: PathBuf,
) -> Result<bool, ConfigError> {
    if config.paths.source.as_ref() == Some(&source) && config.paths.destination.as_ref() == Some(&destination) {
        return Ok(false);
    }

    config.paths.source = Some(source);
    config.paths.destination = Some(destination);
    store.persist(config)?;
    println!(
        "{} {}",
        "Saved paths to".dimmed(),
        store.location().display().dimmed()
    );
    Ok(true)
}
