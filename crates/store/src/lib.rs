//! Snapshot store for backtrail
//!
//! This crate provides:
//! - The [`SnapshotStore`] capability the reconciler drives
//! - [`GitStore`], a git-backed implementation (libgit2 via `git2`)
//! - History listing for the `log` command

pub mod git;
pub mod history;

// Re-exports
pub use git::GitStore;
pub use history::HistoryEntry;

use backtrail_core::PathError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Snapshot store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no snapshot history at {0} (not initialized)")]
    NotInitialized(PathBuf),
}

/// Identifier of one recorded snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of removing a path from the tracked set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Number of tracked entries dropped (more than one for a directory)
    Removed(usize),
    /// Nothing was tracked at that path
    Untracked,
}

/// Append-only snapshot history over a working tree
///
/// All paths are absolute paths inside [`SnapshotStore::root`]. One instance is
/// owned by exactly one reconciler; implementations need not be thread safe.
pub trait SnapshotStore {
    /// Working tree root
    fn root(&self) -> &Path;

    /// Create an empty history if none exists. Idempotent; returns `true` when
    /// a new history was created.
    fn initialize(&mut self) -> Result<bool, StoreError>;

    /// Whether at least one snapshot has been recorded
    fn has_history(&self) -> Result<bool, StoreError>;

    /// Include the current on-disk content of `path` in the next snapshot.
    /// A path missing from the working tree stages its deletion.
    fn stage(&mut self, path: &Path) -> Result<(), StoreError>;

    /// Stage every file in the working tree, including deletions
    fn stage_all(&mut self) -> Result<(), StoreError>;

    /// Drop `path` (or every tracked entry below it) from the next snapshot
    fn remove(&mut self, path: &Path) -> Result<RemoveOutcome, StoreError>;

    /// Record the staged state. Must accept an empty message and an empty change set.
    fn commit(&mut self, message: &str) -> Result<SnapshotId, StoreError>;
}
