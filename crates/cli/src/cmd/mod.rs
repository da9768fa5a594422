//! CLI command implementations

pub mod config;
pub mod log;
pub mod setup;
pub mod watch;
