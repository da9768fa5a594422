//! First-run baseline
//!
//! Events only describe changes from the moment the watch starts. A fresh
//! destination therefore gets one full-tree snapshot first: every non-ignored
//! regular file in the source is copied to its translated path, then the whole
//! destination tree is committed at once.

use crate::reconcile::{copy_into_place, CopyOutcome, ReconcileError, Reconciler};
use backtrail_core::path::strip_root;
use backtrail_core::ShutdownToken;
use backtrail_store::{SnapshotId, SnapshotStore};
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What [`Reconciler::establish_baseline`] found or did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// The destination already has history; nothing was done
    Existing,
    /// A baseline snapshot was recorded
    Created {
        id: SnapshotId,
        files_copied: usize,
        files_failed: usize,
    },
    /// Stop requested during the copy. Nothing was committed, so the next
    /// session starts the baseline over.
    Interrupted { files_copied: usize },
}

#[derive(Debug, Default)]
struct TreeCopy {
    copied: usize,
    failed: usize,
    interrupted: bool,
}

impl<S: SnapshotStore> Reconciler<S> {
    /// Record the baseline snapshot if the destination has no history yet
    ///
    /// With `sync` off, only what already sits in the destination is committed.
    /// A file that cannot be copied is logged and left for the watch loop; it
    /// never prevents the baseline itself.
    pub fn establish_baseline(&mut self, sync: bool, token: &ShutdownToken) -> Result<Baseline, ReconcileError> {
        if self.store().has_history()? {
            debug!("destination has history, skipping baseline");
            return Ok(Baseline::Existing);
        }

        let tree = if sync { self.copy_source_tree(token) } else { TreeCopy::default() };
        if tree.interrupted || token.is_cancelled() {
            info!(files = tree.copied, "baseline interrupted before commit");
            return Ok(Baseline::Interrupted {
                files_copied: tree.copied,
            });
        }

        let store = self.store_mut();
        store.stage_all()?;
        let id = store.commit("")?;

        info!(id = %id.short(), files = tree.copied, failed = tree.failed, "recorded baseline snapshot");
        Ok(Baseline::Created {
            id,
            files_copied: tree.copied,
            files_failed: tree.failed,
        })
    }

    fn copy_source_tree(&self, token: &ShutdownToken) -> TreeCopy {
        let source_root = self.source_root().to_path_buf();
        let mut tree = TreeCopy::default();

        let walker = WalkDir::new(&source_root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(&source_root, entry.path()));

        for entry in walker {
            if token.is_cancelled() {
                tree.interrupted = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // Unreadable or vanished during the walk: the watch loop
                    // catches up once it changes again
                    warn!(error = %err, "skipping entry during baseline");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = strip_root(&source_root, entry.path()) else {
                continue;
            };

            let copied = self
                .translator()
                .translate(&relative)
                .map_err(ReconcileError::from)
                .and_then(|destination| copy_into_place(entry.path(), &destination));

            match copied {
                Ok(CopyOutcome::Copied) => tree.copied += 1,
                Ok(CopyOutcome::Locked) => debug!(path = %relative.display(), "source locked, left out of baseline"),
                Ok(CopyOutcome::Vanished) => debug!(path = %relative.display(), "vanished during baseline"),
                Err(err) => {
                    error!(path = %relative.display(), error = %err, "failed to copy into baseline");
                    tree.failed += 1;
                }
            }
        }

        tree
    }

    fn is_ignored(&self, source_root: &Path, path: &Path) -> bool {
        strip_root(source_root, path)
            .map(|relative| self.ignore_rules().should_ignore(&relative))
            .unwrap_or(false)
    }
}
