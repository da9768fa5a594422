//! Common utilities for integration tests

pub mod cli;
pub mod fixtures;

// Re-export commonly used items
#[allow(unused_imports)]
pub use cli::{wait_for_stdout, wait_until, BtCommand, CommandResult};
pub use fixtures::Workspace;
