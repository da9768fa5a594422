//! Read-only view of the recorded snapshots

use crate::git::head_commit;
use crate::{GitStore, SnapshotId, StoreError};
use git2::{Commit, Repository, Sort};

/// One recorded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: SnapshotId,
    /// Commit time, seconds since the Unix epoch
    pub time_unix_secs: i64,
    /// Paths added, modified or deleted relative to the previous snapshot
    pub files_changed: usize,
    /// First changed path, for a one-line summary
    pub first_path: Option<String>,
}

impl GitStore {
    /// Most recent snapshots, newest first
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let repo = self.repo()?;
        if head_commit(repo)?.is_none() {
            return Ok(Vec::new());
        }

        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut entries = Vec::new();
        for oid in walk.take(limit) {
            let commit = repo.find_commit(oid?)?;
            entries.push(entry_for(repo, &commit)?);
        }
        Ok(entries)
    }

    /// Total number of snapshots reachable from `HEAD`
    pub fn snapshot_count(&self) -> Result<usize, StoreError> {
        let repo = self.repo()?;
        if head_commit(repo)?.is_none() {
            return Ok(0);
        }

        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        let mut count = 0;
        for oid in walk {
            oid?;
            count += 1;
        }
        Ok(count)
    }
}

fn entry_for(repo: &Repository, commit: &Commit<'_>) -> Result<HistoryEntry, StoreError> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None,
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let first_path = diff.deltas().next().and_then(|delta| {
        delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().into_owned())
    });

    Ok(HistoryEntry {
        id: SnapshotId::new(commit.id().to_string()),
        time_unix_secs: commit.time().seconds(),
        files_changed: diff.deltas().len(),
        first_path,
    })
}
