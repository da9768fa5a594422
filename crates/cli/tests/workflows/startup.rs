//! Startup validation and the destination confirmation boundary
//!
//! None of these reach the watch loop: every case must leave the destination
//! exactly as it was.

use crate::bt;
use crate::common::Workspace;
use anyhow::Result;
use std::fs;

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_declining_existing_destination_changes_nothing() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_source("a.txt", "x")?;
    fs::create_dir(ws.destination())?;
    fs::write(ws.destination().join("keep.txt"), "mine")?;

    let result = bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()))
        .stdin("n\n")
        .assert_exit_code(1)?;

    assert!(result.contains_stdout("Still back up to it? (y/n)"));
    assert!(!ws.destination().join(".git").exists());
    assert!(!ws.destination().join("a.txt").exists());
    assert_eq!(fs::read_to_string(ws.destination().join("keep.txt"))?, "mine");
    assert!(!ws.config_path().exists());
    Ok(())
}

#[test]
fn test_end_of_input_declines() -> Result<()> {
    let ws = Workspace::new()?;
    fs::create_dir(ws.destination())?;

    bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()))
        .assert_exit_code(1)?;

    assert!(!ws.destination().join(".git").exists());
    Ok(())
}

#[test]
fn test_missing_paths_exit_with_config_error() -> Result<()> {
    let ws = Workspace::new()?;

    let result = bt!(ws, "watch").assert_exit_code(2)?;
    assert!(result.contains_stderr("no source directory"));

    let result = bt!(ws, "watch", path_str(&ws.source())).assert_exit_code(2)?;
    assert!(result.contains_stderr("no destination directory"));
    Ok(())
}

#[test]
fn test_missing_source_exits_with_config_error() -> Result<()> {
    let ws = Workspace::new()?;

    bt!(ws, "watch", path_str(&ws.root().join("nope")), path_str(&ws.destination()))
        .assert_exit_code(2)?;

    assert!(!ws.destination().exists());
    Ok(())
}

#[test]
fn test_nested_destination_is_rejected() -> Result<()> {
    let ws = Workspace::new()?;
    let nested = ws.source().join("backup");

    bt!(ws, "watch", path_str(&ws.source()), path_str(&nested), "--yes")
        .assert_exit_code(2)?;

    assert!(!nested.exists());
    Ok(())
}

#[test]
fn test_unparsable_config_exits_with_config_error() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_config("[paths\nsource = ")?;

    let result = bt!(ws, "watch").assert_exit_code(2)?;
    assert!(result.contains_stderr("config.toml"));
    Ok(())
}

#[test]
fn test_config_command() -> Result<()> {
    let ws = Workspace::new()?;

    let result = bt!(ws, "config", "--path").assert_success()?;
    assert_eq!(result.stdout.trim(), path_str(&ws.config_path()));

    let result = bt!(ws, "config").assert_success()?;
    assert!(result.contains_stdout("not written yet"));
    assert!(result.contains_stdout("baseline_sync = true"));

    let result = bt!(ws, "config", "--example").assert_success()?;
    assert!(result.contains_stdout("layout = \"relative\""));
    assert!(!ws.config_path().exists());

    let result = bt!(ws, "config", "--init").assert_success()?;
    assert!(result.contains_stdout("Wrote default configuration"));
    assert!(ws.config_path().exists());

    let result = bt!(ws, "config", "--init").assert_success()?;
    assert!(result.contains_stdout("already exists"));
    Ok(())
}

#[test]
fn test_log_without_history() -> Result<()> {
    let ws = Workspace::new()?;

    let result = bt!(ws, "log", path_str(&ws.destination())).assert_success()?;
    assert!(result.contains_stdout("No snapshots yet"));

    // Nothing configured and nothing given
    bt!(ws, "log").assert_exit_code(2)?;
    Ok(())
}
