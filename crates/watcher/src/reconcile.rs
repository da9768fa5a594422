//! Reconciliation of one intent into the snapshot store
//!
//! The source tree keeps changing while we work, so every step reports an
//! explicit outcome instead of failing on the first surprise:
//!
//! - the file vanished since classification → fall through to removal
//! - the file is locked by its writer → skip quietly, a later event retries
//! - anything else unexpected → [`ReconcileError`], contained by the caller
//!
//! A reconciliation that changes the tracked set always ends in a commit, even
//! when the commit records no net change.

use crate::classify::{classify, is_not_found, probe, ClassifyError, Probe};
use crate::ignore::IgnoreRules;
use backtrail_core::{Intent, PathError, PathTranslator, RawEvent};
use backtrail_store::{RemoveOutcome, SnapshotId, SnapshotStore, StoreError};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Message recorded on every snapshot
const SNAPSHOT_MESSAGE: &str = "";

/// Per-event failure, contained by the watch loop
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("snapshot store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A snapshot was recorded
    Committed(SnapshotId),
    /// Nothing was recorded
    Skipped(SkipReason),
}

/// Why a cycle ended without a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Classified as `Ignore`
    Ignored,
    /// No longer a regular file by the time it was copied
    NotAFile,
    /// Removal of a path that was never tracked
    Untracked,
    /// Source locked by another writer; a later event picks it up
    Locked,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Ignored => "ignored",
            Self::NotAFile => "not a regular file",
            Self::Untracked => "not tracked",
            Self::Locked => "locked",
        };
        f.write_str(reason)
    }
}

/// Outcome of copying one file into the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CopyOutcome {
    Copied,
    Locked,
    Vanished,
}

/// Applies intents to the snapshot tree
///
/// Owns its store exclusively; one reconciler per watched tree.
pub struct Reconciler<S> {
    translator: PathTranslator,
    store: S,
    ignore: IgnoreRules,
}

impl<S: SnapshotStore> Reconciler<S> {
    pub fn new(translator: PathTranslator, store: S, ignore: IgnoreRules) -> Self {
        Self {
            translator,
            store,
            ignore,
        }
    }

    pub fn source_root(&self) -> &Path {
        self.translator.source_root()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    pub(crate) fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Classify and apply one raw event
    pub fn handle(&mut self, event: &RawEvent) -> Result<Outcome, ReconcileError> {
        if let Some(relative) = event.path() {
            if self.ignore.is_rule_file(relative) {
                match self.ignore.reload() {
                    Ok(()) => debug!(path = %relative.display(), "reloaded ignore rules"),
                    Err(err) => warn!(error = %err, "failed to reload ignore rules, keeping previous rules"),
                }
            }
        }

        let intent = classify(event, self.source_root(), &self.ignore)?;
        self.apply(intent)
    }

    /// Apply one classified intent
    pub fn apply(&mut self, intent: Intent) -> Result<Outcome, ReconcileError> {
        match intent {
            Intent::Upsert(relative) => self.upsert(&relative),
            Intent::Remove(relative) => self.remove(&relative),
            Intent::Ignore => Ok(Outcome::Skipped(SkipReason::Ignored)),
        }
    }

    fn upsert(&mut self, relative: &Path) -> Result<Outcome, ReconcileError> {
        let source = self.source_root().join(relative);

        // 1. Re-probe: the file may have changed since classification
        match probe(&source) {
            Ok(Probe::RegularFile) => {}
            Ok(Probe::Missing) => {
                debug!(path = %relative.display(), "vanished before copy, removing");
                return self.remove(relative);
            }
            Ok(Probe::Other) => return Ok(Outcome::Skipped(SkipReason::NotAFile)),
            Err(source_err) => {
                return Err(ClassifyError {
                    path: source,
                    source: source_err,
                }
                .into())
            }
        }

        // 2. Copy into place
        let destination = self.translator.translate(relative)?;
        match copy_into_place(&source, &destination)? {
            CopyOutcome::Copied => {}
            CopyOutcome::Locked => {
                debug!(path = %relative.display(), "source locked, skipping");
                return Ok(Outcome::Skipped(SkipReason::Locked));
            }
            CopyOutcome::Vanished => {
                debug!(path = %relative.display(), "vanished during copy, removing");
                return self.remove(relative);
            }
        }

        // 3. Stage and record
        self.store.stage(&destination)?;
        let id = self.store.commit(SNAPSHOT_MESSAGE)?;
        Ok(Outcome::Committed(id))
    }

    fn remove(&mut self, relative: &Path) -> Result<Outcome, ReconcileError> {
        let destination = self.translator.translate(relative)?;

        let removed = self.store.remove(&destination)?;
        remove_from_worktree(&destination)?;

        match removed {
            RemoveOutcome::Untracked => {
                debug!(path = %relative.display(), "not tracked, nothing to remove");
                Ok(Outcome::Skipped(SkipReason::Untracked))
            }
            RemoveOutcome::Removed(entries) => {
                debug!(path = %relative.display(), entries, "removed from snapshot");
                let id = self.store.commit(SNAPSHOT_MESSAGE)?;
                Ok(Outcome::Committed(id))
            }
        }
    }
}

/// Copy `source` over `destination` through a temporary file in the same
/// directory, so the destination never holds a partial copy
pub(crate) fn copy_into_place(source: &Path, destination: &Path) -> Result<CopyOutcome, ReconcileError> {
    let copy_err = |source_err: io::Error| ReconcileError::Copy {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: source_err,
    };

    let parent = destination.parent().ok_or_else(|| ReconcileError::Destination {
        path: destination.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent directory"),
    })?;
    fs::create_dir_all(parent).map_err(|source_err| ReconcileError::Destination {
        path: parent.to_path_buf(),
        source: source_err,
    })?;

    let mut input = match File::open(source) {
        Ok(file) => file,
        Err(e) => return read_failure(e).map_err(copy_err),
    };

    let mut staging = tempfile::Builder::new()
        .prefix(".backtrail-")
        .tempfile_in(parent)
        .map_err(copy_err)?;

    if let Err(e) = io::copy(&mut input, staging.as_file_mut()) {
        return read_failure(e).map_err(copy_err);
    }

    if let Ok(meta) = input.metadata() {
        // Keeps the executable bit, which the store records
        if let Err(e) = fs::set_permissions(staging.path(), meta.permissions()) {
            debug!(path = %destination.display(), error = %e, "could not copy permissions");
        }
    }

    staging.persist(destination).map_err(|e| copy_err(e.error))?;
    Ok(CopyOutcome::Copied)
}

/// Map a read-side failure to a defined degradation where there is one
pub(crate) fn read_failure(err: io::Error) -> Result<CopyOutcome, io::Error> {
    if is_not_found(&err) {
        Ok(CopyOutcome::Vanished)
    } else if is_transient_lock(&err) {
        Ok(CopyOutcome::Locked)
    } else {
        Err(err)
    }
}

/// Another process holds the file in a way that blocks reading for now
pub fn is_transient_lock(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ResourceBusy | io::ErrorKind::ExecutableFileBusy
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    if matches!(err.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }

    false
}

/// Delete the mirrored file (or directory) from the destination working tree
fn remove_from_worktree(destination: &Path) -> Result<(), ReconcileError> {
    let result = match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(destination),
        Ok(_) => fs::remove_file(destination),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(source) => Err(ReconcileError::Destination {
            path: destination.to_path_buf(),
            source,
        }),
    }
}
