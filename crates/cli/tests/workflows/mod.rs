//! Workflow integration tests
//!
//! End-to-end runs of the `backtrail` binary.

pub mod startup;
pub mod watch_session;
