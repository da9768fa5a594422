//! Ignore pattern management
//!
//! Sources, in order of precedence:
//! 1. Built-in patterns (any `.git` component - always active)
//! 2. Editor temp files and OS metadata files (optional)
//! 3. `.backtrailignore` at the source root (optional)
//! 4. `.gitignore` at the source root (optional)
//! 5. Config-based patterns

use backtrail_core::IgnoreConfig;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Name of the backtrail-specific ignore file
pub const IGNORE_FILE: &str = ".backtrailignore";

/// Ignore rule failure
pub type IgnoreError = ignore::Error;

/// Ignore rules for one watched tree
///
/// All paths passed in are relative to the source root.
pub struct IgnoreRules {
    /// Watched root directory
    source_root: PathBuf,

    /// `.backtrailignore` patterns
    backtrailignore: Option<Gitignore>,

    /// `.gitignore` patterns
    gitignore: Option<Gitignore>,

    /// Patterns from configuration
    configured: Option<Gitignore>,

    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for the watched tree
    pub fn load(source_root: &Path, config: IgnoreConfig) -> Result<Self, IgnoreError> {
        let mut rules = Self {
            source_root: source_root.to_path_buf(),
            backtrailignore: None,
            gitignore: None,
            configured: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Rules that only apply the built-in patterns
    pub fn builtin_only(source_root: &Path) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            backtrailignore: None,
            gitignore: None,
            configured: None,
            config: IgnoreConfig {
                use_gitignore: false,
                use_backtrailignore: false,
                editor_temp: false,
                additional_patterns: vec![],
            },
        }
    }

    /// Re-read ignore files from disk
    ///
    /// On error the previous rules stay in effect.
    pub fn reload(&mut self) -> Result<(), IgnoreError> {
        let backtrailignore = if self.config.use_backtrailignore {
            self.build_from_file(IGNORE_FILE)?
        } else {
            None
        };

        let gitignore = if self.config.use_gitignore {
            self.build_from_file(".gitignore")?
        } else {
            None
        };

        let configured = if self.config.additional_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(&self.source_root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        self.backtrailignore = backtrailignore;
        self.gitignore = gitignore;
        self.configured = configured;
        Ok(())
    }

    fn build_from_file(&self, name: &str) -> Result<Option<Gitignore>, IgnoreError> {
        let path = self.source_root.join(name);
        if !path.is_file() {
            return Ok(None);
        }

        let mut builder = GitignoreBuilder::new(&self.source_root);
        if let Some(err) = builder.add(&path) {
            return Err(err);
        }
        Ok(Some(builder.build()?))
    }

    /// Whether a change to `relative` should trigger [`IgnoreRules::reload`]
    pub fn is_rule_file(&self, relative: &Path) -> bool {
        relative == Path::new(IGNORE_FILE) || relative == Path::new(".gitignore")
    }

    /// Check if a source-relative path should be ignored
    pub fn should_ignore(&self, relative: &Path) -> bool {
        // 1. Built-in patterns (always enforced)
        if is_builtin_ignored(relative) {
            return true;
        }

        // 2. Editor temp files
        if self.config.editor_temp && is_editor_temp(relative) {
            return true;
        }

        let is_dir = self.source_root.join(relative).is_dir();
        let matchers = [&self.backtrailignore, &self.gitignore, &self.configured];

        // 3-5. Pattern files; a whitelist (`!pattern`) in an earlier source wins
        for matcher in matchers.into_iter().flatten() {
            let matched = matcher.matched_path_or_any_parents(relative, is_dir);
            if matched.is_whitelist() {
                return false;
            }
            if matched.is_ignore() {
                return true;
            }
        }

        false
    }

    /// Number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.config.editor_temp {
            count += 1;
        }
        count += [&self.backtrailignore, &self.gitignore, &self.configured]
            .iter()
            .filter(|m| m.is_some())
            .count();
        count
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}

/// `.git` anywhere in the path: libgit2 refuses to index such paths and a
/// nested repository is not ours to mirror
fn is_builtin_ignored(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str() == ".git")
}

/// Editor swap/backup files and OS metadata files
fn is_editor_temp(relative: &Path) -> bool {
    let filename = relative
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    // Vim swap files
    if filename.ends_with(".swp")
        || filename.ends_with(".swo")
        || filename.ends_with(".swx") {
        return true;
    }

    // Vim/Emacs backup files
    if filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save and lock files
    if (filename.len() > 1 && filename.starts_with('#') && filename.ends_with('#'))
        || filename.starts_with(".#") {
        return true;
    }

    // MacOS / Windows system files
    filename == ".DS_Store"
        || filename.starts_with("._")
        || filename == "Thumbs.db"
        || filename == "desktop.ini"
}
