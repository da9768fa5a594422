//! Startup validation and the destination confirmation prompt
//!
//! Everything here runs before the destination is touched: a failure or a
//! declined prompt leaves no trace on disk.

use backtrail_core::{Config, ConfigError, WatchPaths};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reasons to abort before the watch starts
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no source directory given and none configured (try `backtrail setup`)")]
    MissingSource,

    #[error("no destination directory given and none configured (try `backtrail setup`)")]
    MissingDestination,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not backing up to {}", .0.display())]
    Declined(PathBuf),
}

impl StartupError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Declined(_) => 1,
            Self::MissingSource | Self::MissingDestination | Self::Config(_) => 2,
        }
    }
}

/// Command-line paths, falling back to the configured ones
pub fn resolve_paths(
    source: Option<&Path>,
    destination: Option<&Path>,
    config: &Config,
) -> Result<WatchPaths, StartupError> {
    config.validate()?;

    let source = source
        .or(config.paths.source.as_deref())
        .ok_or(StartupError::MissingSource)?;
    let destination = destination
        .or(config.paths.destination.as_deref())
        .ok_or(StartupError::MissingDestination)?;

    Ok(WatchPaths::resolve(source, destination)?)
}

/// Ask whether to back up into an existing destination
///
/// Only an explicit `y` or `yes` confirms; end of input declines.
pub fn confirm_destination<R: BufRead, W: Write>(destination: &Path, mut input: R, mut output: W) -> io::Result<bool> {
    writeln!(
        output,
        "{} Path to back up to already exists (\"{}\").",
        "warning:".yellow().bold(),
        destination.display()
    )?;
    write!(output, "Still back up to it? (y/n) ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
