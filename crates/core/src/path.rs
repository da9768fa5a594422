//! Path translation between the watched tree and the snapshot tree
//!
//! Every path that crosses from the source side to the destination side goes
//! through here. Relative paths are validated once (no empty paths, no absolute
//! paths, no `..` escaping the watched root) and then joined under the
//! destination root according to the configured [`Layout`].

use crate::config::Layout;
use std::path::{Component, Path, PathBuf, Prefix};
use thiserror::Error;

/// Invalid path handed to the translator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Relative path has no components
    #[error("empty relative path")]
    Empty,

    /// Relative path carries a root or volume prefix
    #[error("expected a relative path, got {0}")]
    Absolute(PathBuf),

    /// Relative path walks above the watched root
    #[error("path escapes the watched root: {0}")]
    Escapes(PathBuf),

    /// Path is not located under the given root
    #[error("{path} is not inside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Store paths must be valid UTF-8
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
}

/// Validate and normalize a path relative to the watched root
///
/// - Drops `.` components
/// - Resolves `..` against earlier components, rejecting any that climb above the root
/// - Rejects absolute paths and empty paths
pub fn normalize_relative(relative: &Path) -> Result<PathBuf, PathError> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathError::Escapes(relative.to_path_buf()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(relative.to_path_buf()));
            }
        }
    }

    if parts.is_empty() {
        return Err(PathError::Empty);
    }

    Ok(parts.iter().collect())
}

/// Translate a source-relative path into its place under the destination root
///
/// Uses the [`Layout::Relative`] layout: the relative structure is preserved
/// directly beneath `destination_root`, whatever the two roots look like.
pub fn translate(
    source_root: &Path,
    destination_root: &Path,
    relative_path: &Path,
) -> Result<PathBuf, PathError> {
    PathTranslator::new(source_root, destination_root, Layout::Relative).translate(relative_path)
}

/// Strip `root` from an absolute path, yielding the path relative to it
///
/// Returns `None` when `path` lies outside `root`. The root itself maps to an
/// empty path.
pub fn strip_root(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Slash-separated path of `path` relative to `root`, as a snapshot store indexes it
pub fn relative_to_store(root: &Path, path: &Path) -> Result<String, PathError> {
    let relative = path.strip_prefix(root).map_err(|_| PathError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })?;
    let relative = normalize_relative(relative)?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| PathError::NonUtf8(relative.clone()))?;
        parts.push(part);
    }

    Ok(parts.join("/"))
}

/// Translator bound to one source/destination pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    source_root: PathBuf,
    destination_root: PathBuf,
    layout: Layout,
}

impl PathTranslator {
    pub fn new(source_root: &Path, destination_root: &Path, layout: Layout) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            layout,
        }
    }

    /// Destination path for a source-relative path
    pub fn translate(&self, relative_path: &Path) -> Result<PathBuf, PathError> {
        let relative = normalize_relative(relative_path)?;

        match self.layout {
            Layout::Relative => Ok(self.destination_root.join(relative)),
            Layout::Absolute => {
                let mut destination = self.destination_root.clone();
                for component in self.source_root.join(relative).components() {
                    match component {
                        Component::Prefix(prefix) => destination.push(volume_dir(prefix.kind(), prefix.as_os_str())),
                        Component::RootDir | Component::CurDir => {}
                        Component::ParentDir => {
                            if destination != self.destination_root {
                                destination.pop();
                            }
                        }
                        Component::Normal(part) => destination.push(part),
                    }
                }
                Ok(destination)
            }
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// Directory name standing in for a volume prefix (`C:` → `C`)
fn volume_dir(kind: Prefix<'_>, raw: &std::ffi::OsStr) -> String {
    match kind {
        Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
            char::from(letter).to_ascii_uppercase().to_string()
        }
        _ => {
            let cleaned: String = raw
                .to_string_lossy()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
                .collect();
            cleaned.trim_matches('_').to_string()
        }
    }
}
