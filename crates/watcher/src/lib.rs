//! Change reconciliation for backtrail
//!
//! This crate provides:
//! - A recursive filesystem subscription ([`Watcher`]) feeding a channel
//! - Event classification against the live source tree
//! - The [`Reconciler`], which turns one intent into one snapshot
//! - First-run baseline and the sequential watch loop ([`driver::run`])
//! - `.backtrailignore` / `.gitignore` / built-in ignore rules

pub mod baseline;
pub mod classify;
pub mod driver;
pub mod events;
pub mod ignore;
pub mod reconcile;

// Re-exports
pub use baseline::Baseline;
pub use classify::{classify, ClassifyError};
pub use driver::{LoopExit, LoopReport, LoopStats};
pub use events::{Notice, Watcher};
pub use ignore::{IgnoreError, IgnoreRules, IGNORE_FILE};
pub use reconcile::{is_transient_lock, Outcome, ReconcileError, Reconciler, SkipReason};
