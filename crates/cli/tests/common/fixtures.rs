//! Throwaway source/destination layouts for CLI tests

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temp directory with a `source/` tree, a not-yet-created `backup/`, and a
/// private configuration file
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("source"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("source")
    }

    pub fn destination(&self) -> PathBuf {
        self.root().join("backup")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config").join("config.toml")
    }

    /// Write a file below the source root
    pub fn write_source(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.source().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        let path = self.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}
