//! Event classification
//!
//! A raw event only says "something happened at this path". What happened is
//! decided by probing the path right now.

use crate::ignore::IgnoreRules;
use backtrail_core::{Intent, RawEvent, RawEventKind};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Probe failed for a reason other than absence
#[derive(Debug, Error)]
#[error("failed to inspect {path}: {source}")]
pub struct ClassifyError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Current state of a source path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Missing,
    RegularFile,
    /// Directory, symlink, device, socket, ...
    Other,
}

/// Inspect `path` without following symlinks
pub fn probe(path: &Path) -> io::Result<Probe> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => Ok(Probe::RegularFile),
        Ok(_) => Ok(Probe::Other),
        Err(e) if is_not_found(&e) => Ok(Probe::Missing),
        Err(e) => Err(e),
    }
}

/// Absence, including a parent component that is no longer a directory
pub fn is_not_found(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

/// Decide what `event` implies for the snapshot tree
pub fn classify(event: &RawEvent, source_root: &Path, ignore: &IgnoreRules) -> Result<Intent, ClassifyError> {
    if event.kind != RawEventKind::Changed {
        return Ok(Intent::Ignore);
    }

    let Some(relative) = event.path() else {
        return Ok(Intent::Ignore);
    };

    if ignore.should_ignore(relative) {
        return Ok(Intent::Ignore);
    }

    let absolute = source_root.join(relative);
    match probe(&absolute) {
        Ok(Probe::Missing) => Ok(Intent::Remove(relative.to_path_buf())),
        Ok(Probe::RegularFile) => Ok(Intent::Upsert(relative.to_path_buf())),
        Ok(Probe::Other) => Ok(Intent::Ignore),
        Err(source) => Err(ClassifyError { path: absolute, source }),
    }
}
