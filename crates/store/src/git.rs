//! Git-backed snapshot store
//!
//! The destination directory is an ordinary git working tree. Staging goes
//! through the index, snapshots are commits on `HEAD`. Commits are always made
//! with an empty message and are never refused for lack of changes.

use crate::{RemoveOutcome, SnapshotId, SnapshotStore, StoreError};
use backtrail_core::path::relative_to_store;
use git2::{Commit, ErrorCode, IndexAddOption, Repository, Signature};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Snapshot store over a git repository rooted at the destination
pub struct GitStore {
    root: PathBuf,
    repo: Option<Repository>,
}

impl GitStore {
    /// Store for `root`; nothing is touched until [`SnapshotStore::initialize`]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            repo: None,
        }
    }

    /// Open an existing history
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let repo = match Repository::open(&root) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(StoreError::NotInitialized(root)),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            root,
            repo: Some(repo),
        })
    }

    /// Path of the repository's `.git` directory
    pub fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    /// Identifier of the latest snapshot, if any
    pub fn head_id(&self) -> Result<Option<SnapshotId>, StoreError> {
        let repo = self.repo()?;
        Ok(head_commit(repo)?.map(|c| SnapshotId::new(c.id().to_string())))
    }

    /// Whether `path` is in the tracked set
    pub fn is_tracked(&self, path: &Path) -> Result<bool, StoreError> {
        let rel = relative_to_store(&self.root, path)?;
        let index = self.repo()?.index()?;
        Ok(index.get_path(Path::new(&rel), 0).is_some())
    }

    pub(crate) fn repo(&self) -> Result<&Repository, StoreError> {
        self.repo
            .as_ref()
            .ok_or_else(|| StoreError::NotInitialized(self.root.clone()))
    }
}

impl SnapshotStore for GitStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn initialize(&mut self) -> Result<bool, StoreError> {
        if self.repo.is_some() {
            return Ok(false);
        }

        if self.git_dir().exists() {
            self.repo = Some(Repository::open(&self.root)?);
            debug!(root = %self.root.display(), "opened existing snapshot history");
            return Ok(false);
        }

        std::fs::create_dir_all(&self.root)?;
        self.repo = Some(Repository::init(&self.root)?);
        info!(root = %self.root.display(), "initialized snapshot history");
        Ok(true)
    }

    fn has_history(&self) -> Result<bool, StoreError> {
        Ok(head_commit(self.repo()?)?.is_some())
    }

    fn stage(&mut self, path: &Path) -> Result<(), StoreError> {
        let rel = relative_to_store(&self.root, path)?;
        let rel_path = Path::new(&rel);
        let mut index = self.repo()?.index()?;

        match path.symlink_metadata() {
            Ok(_) => index.add_path(rel_path)?,
            // Gone from the working tree: staging it means staging the deletion
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if index.get_path(rel_path, 0).is_some() {
                    index.remove_path(rel_path)?;
                }
            }
            Err(e) => return Err(e.into()),
        }
        index.write()?;
        Ok(())
    }

    fn stage_all(&mut self) -> Result<(), StoreError> {
        let mut index = self.repo()?.index()?;
        // FORCE: a mirrored .gitignore must not hide files the events would track
        index.add_all(["*"].iter(), IndexAddOption::FORCE, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<RemoveOutcome, StoreError> {
        let rel = relative_to_store(&self.root, path)?;
        let rel_path = Path::new(&rel);
        let mut index = self.repo()?.index()?;

        if index.get_path(rel_path, 0).is_some() {
            index.remove_path(rel_path)?;
            index.write()?;
            return Ok(RemoveOutcome::Removed(1));
        }

        // A directory is never an index entry itself, only its files are
        let prefix = format!("{rel}/");
        let nested = index
            .iter()
            .filter(|entry| entry.path.starts_with(prefix.as_bytes()))
            .count();
        if nested == 0 {
            return Ok(RemoveOutcome::Untracked);
        }

        index.remove_dir(rel_path, 0)?;
        index.write()?;
        Ok(RemoveOutcome::Removed(nested))
    }

    fn commit(&mut self, message: &str) -> Result<SnapshotId, StoreError> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = signature(repo)?;

        let parent = head_commit(repo)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        debug!(id = %oid, "recorded snapshot");
        Ok(SnapshotId::new(oid.to_string()))
    }
}

/// Commit at `HEAD`, or `None` on an unborn branch
pub(crate) fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, git2::Error> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// User's git identity, falling back to a fixed one on unconfigured machines
fn signature(repo: &Repository) -> Result<Signature<'static>, git2::Error> {
    repo.signature()
        .or_else(|_| Signature::now("backtrail", "backtrail@localhost"))
}
