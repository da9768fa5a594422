//! Core types for backtrail
//!
//! This crate provides:
//! - Source → destination path translation
//! - Raw event / intent data model shared by the watcher and reconciler
//! - Persistent configuration (TOML)
//! - Cooperative shutdown token for watch sessions

pub mod config;
pub mod event;
pub mod path;
pub mod shutdown;

// Re-exports
pub use config::{Config, ConfigError, IgnoreConfig, Layout, PathsConfig, WatchConfig, WatchPaths};
pub use event::{Intent, RawEvent, RawEventKind};
pub use path::{translate, PathError, PathTranslator};
pub use shutdown::ShutdownToken;
