//! Raw filesystem events and the intents derived from them

use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a raw notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// Something happened at the path: create, content or metadata change,
    /// removal, or either half of a rename
    Changed,
    /// Notification carries nothing actionable (access, platform-specific noise)
    Unknown,
}

impl fmt::Display for RawEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawEventKind::Changed => write!(f, "change"),
            RawEventKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// One notification from the watcher, relative to the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    /// Absent for bulk notifications or paths outside the watched root
    pub relative_path: Option<PathBuf>,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, relative_path: Option<PathBuf>) -> Self {
        Self { kind, relative_path }
    }

    /// Convenience constructor for a `Changed` event
    pub fn changed(relative_path: impl Into<PathBuf>) -> Self {
        Self::new(RawEventKind::Changed, Some(relative_path.into()))
    }

    /// The actionable path, if any (empty paths count as absent)
    pub fn path(&self) -> Option<&Path> {
        self.relative_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{} {}", self.kind, path.display()),
            None => write!(f, "{} <no path>", self.kind),
        }
    }
}

/// What a raw event implies for the snapshot tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Source holds a regular file: mirror its content
    Upsert(PathBuf),
    /// Source path is gone: drop it from the snapshot
    Remove(PathBuf),
    /// Nothing to mirror
    Ignore,
}

impl Intent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Intent::Upsert(path) | Intent::Remove(path) => Some(path),
            Intent::Ignore => None,
        }
    }
}
