//! Persistent configuration
//!
//! Stored as TOML at `<config dir>/backtrail/config.toml`:
//!
//! ```toml
//! [paths]
//! source = "/home/ada/work"
//! destination = "/mnt/backup/work"
//!
//! [watch]
//! layout = "relative"
//! baseline_sync = true
//!
//! [ignore]
//! use_gitignore = false
//! use_backtrailignore = true
//! editor_temp = true
//! additional_patterns = ["*.tmp"]
//! ```
//!
//! A missing file is the same as an empty one: every field has a default.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source directory {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("source {0} is not a directory")]
    SourceNotDirectory(PathBuf),

    #[error("destination {0} exists and is not a directory")]
    DestinationNotDirectory(PathBuf),

    #[error("source {source_root} and destination {destination} overlap")]
    Overlap {
        source_root: PathBuf,
        destination: PathBuf,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where mirrored files land under the destination root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<destination>/<relative path>`
    #[default]
    Relative,
    /// `<destination>/<volume>/<absolute source path>`
    Absolute,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub watch: WatchConfig,
    pub ignore: IgnoreConfig,
}

/// Previously used source and destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

/// Watch behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub layout: Layout,
    /// Copy the whole source tree into a fresh destination before the first commit
    pub baseline_sync: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            layout: Layout::Relative,
            baseline_sync: true,
        }
    }
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Honour `<source>/.gitignore` (default: false, a backup wants build output too)
    pub use_gitignore: bool,

    /// Honour `<source>/.backtrailignore` (default: true)
    pub use_backtrailignore: bool,

    /// Skip editor swap/backup files and OS metadata files (default: true)
    pub editor_temp: bool,

    /// Additional gitignore-style patterns
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: false,
            use_backtrailignore: true,
            editor_temp: true,
            additional_patterns: vec![],
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomically write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(serialized.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Validate values that serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pattern) = self.ignore.additional_patterns.iter().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "ignore.additional_patterns contains an empty pattern ({pattern:?})"
            )));
        }
        for (name, path) in [("paths.source", &self.paths.source), ("paths.destination", &self.paths.destination)] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!("{name} is empty")));
                }
            }
        }
        Ok(())
    }
}

/// Default location of the configuration file
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("backtrail").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Write a default configuration file if none exists yet
pub fn init_if_missing(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    Config::default().save_to(path)?;
    Ok(true)
}

/// Annotated example configuration
pub fn example_config() -> String {
    r#"# backtrail configuration

[paths]
# Directory to watch
# source = "/home/you/work"
# Directory holding the mirrored snapshot history
# destination = "/mnt/backup/work"

[watch]
# "relative": <destination>/<path inside source>
# "absolute": <destination>/<volume>/<full source path>
layout = "relative"
# Copy the existing source tree before the first snapshot
baseline_sync = true

[ignore]
use_gitignore = false
use_backtrailignore = true
editor_temp = true
additional_patterns = []
"#
    .to_string()
}

/// Validated, absolute source and destination roots for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPaths {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl WatchPaths {
    /// Resolve and validate both roots without touching the filesystem
    ///
    /// The source must be an existing directory. The destination may be
    /// missing, but if something exists there it must be a directory. The two
    /// trees must not contain one another.
    pub fn resolve(source: &Path, destination: &Path) -> Result<Self, ConfigError> {
        let source_meta = std::fs::metadata(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::SourceMissing(source.to_path_buf()),
            _ => ConfigError::Read {
                path: source.to_path_buf(),
                source: e,
            },
        })?;
        if !source_meta.is_dir() {
            return Err(ConfigError::SourceNotDirectory(source.to_path_buf()));
        }
        let source = source.canonicalize().map_err(|source_err| ConfigError::Read {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let destination = resolve_destination(destination)?;

        if source.starts_with(&destination) || destination.starts_with(&source) {
            return Err(ConfigError::Overlap {
                source_root: source,
                destination,
            });
        }

        Ok(Self { source, destination })
    }

    /// Whether the destination differs from `previous` and already holds an entry
    pub fn destination_needs_confirmation(&self, previous: Option<&Path>) -> bool {
        let unchanged = previous
            .and_then(|prev| resolve_destination(prev).ok())
            .is_some_and(|prev| prev == self.destination);
        !unchanged && self.destination.exists()
    }
}

fn resolve_destination(destination: &Path) -> Result<PathBuf, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: destination.to_path_buf(),
        source,
    };

    match std::fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => destination.canonicalize().map_err(read_err),
        Ok(_) => Err(ConfigError::DestinationNotDirectory(destination.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let absolute = std::path::absolute(destination).map_err(read_err)?;
            // Canonicalize the deepest existing ancestor so comparisons with the
            // canonical source are meaningful
            let mut existing = absolute.as_path();
            let mut missing = Vec::new();
            while !existing.exists() {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Ok(absolute),
                }
            }
            let mut resolved = existing.canonicalize().map_err(read_err)?;
            resolved.extend(missing.iter().rev());
            Ok(resolved)
        }
        Err(e) => Err(read_err(e)),
    }
}
