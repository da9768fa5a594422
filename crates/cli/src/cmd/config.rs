//! Show the saved configuration

use crate::capabilities::ConfigStore;
use crate::startup::StartupError;
use anyhow::{Context, Result};
use backtrail_core::config::{example_config, init_if_missing};
use owo_colors::OwoColorize;

pub struct ConfigArgs {
    pub path: bool,
    pub init: bool,
    pub example: bool,
}

pub fn run(args: ConfigArgs, config_store: &dyn ConfigStore) -> Result<()> {
    let location = config_store.location();
    if args.path {
        println!("{}", location.display());
        return Ok(());
    }
    if args.example {
        print!("{}", example_config());
        return Ok(());
    }
    if args.init {
        if init_if_missing(location).map_err(StartupError::from)? {
            println!("{} Wrote default configuration to {}", "✓".green(), location.display());
        } else {
            println!("{} already exists", location.display());
        }
        return Ok(());
    }

    let config = config_store.load().map_err(StartupError::from)?;
    config.validate().map_err(StartupError::from)?;

    println!("{}", "Configuration".bold());
    let note = if location.exists() { "" } else { " (not written yet, showing defaults)" };
    println!("{}: {}{}\n", "Location".dimmed(), location.display().dimmed(), note.dimmed());

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    for line in rendered.lines() {
        if line.starts_with('[') {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}
