//! Full watch sessions against the real binary
//!
//! Each test starts `backtrail watch` in the background, changes the source
//! tree and waits for the mirror to catch up.

use crate::bt;
use crate::common::{wait_for_stdout, wait_until, Workspace};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Child;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(15);

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn has_content(path: &Path, expected: &str) -> bool {
    fs::read_to_string(path).map(|c| c == expected).unwrap_or(false)
}

/// Ask the session to stop and return its exit code
#[cfg(unix)]
fn stop(mut child: Child) -> Result<i32> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)?;
    let status = child.wait()?;
    status.code().context("watch session was killed by a signal")
}

#[cfg(not(unix))]
fn stop(mut child: Child) -> Result<i32> {
    child.kill()?;
    child.wait()?;
    Ok(0)
}

fn snapshot_lines(ws: &Workspace) -> Result<Vec<String>> {
    let result = bt!(ws, "log", path_str(&ws.destination()), "--limit", "100").assert_success()?;
    Ok(result
        .stdout
        .lines()
        .filter(|line| line.contains(" - "))
        .map(str::to_string)
        .collect())
}

#[test]
fn test_create_modify_delete_session() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_source("existing.txt", "before")?;

    let mut child = bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()), "--yes").spawn()?;
    wait_for_stdout(&mut child, "Watching")?;

    // Baseline
    let existing = ws.destination().join("existing.txt");
    assert!(wait_until(TIMEOUT, || has_content(&existing, "before")), "baseline never copied");

    let mirrored = ws.destination().join("a.txt");
    ws.write_source("a.txt", "x")?;
    assert!(wait_until(TIMEOUT, || has_content(&mirrored, "x")), "create never mirrored");

    ws.write_source("a.txt", "y")?;
    assert!(wait_until(TIMEOUT, || has_content(&mirrored, "y")), "modify never mirrored");

    fs::remove_file(ws.source().join("a.txt"))?;
    assert!(wait_until(TIMEOUT, || !mirrored.exists()), "delete never mirrored");

    // A stop lets the event in progress finish its commit
    assert_eq!(stop(child)?, 0);

    // Baseline + at least one snapshot per change
    let snapshots = snapshot_lines(&ws)?;
    assert!(snapshots.len() >= 4, "too few snapshots: {snapshots:#?}");
    assert!(!ws.destination().join(".git/backtrail.lock").exists());
    Ok(())
}

#[test]
fn test_session_remembers_paths() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_source("a.txt", "x")?;

    let mut child = bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()), "--yes").spawn()?;
    wait_for_stdout(&mut child, "Watching")?;
    let mirrored = ws.destination().join("a.txt");
    assert!(wait_until(TIMEOUT, || has_content(&mirrored, "x")));
    assert_eq!(stop(child)?, 0);

    let config = fs::read_to_string(ws.config_path())?;
    assert!(config.contains("backup"));

    // Same destination again: no prompt, paths come from the config
    let mut child = bt!(ws, "watch").spawn()?;
    wait_for_stdout(&mut child, "Watching")?;
    ws.write_source("b.txt", "y")?;
    let second = ws.destination().join("b.txt");
    assert!(wait_until(TIMEOUT, || has_content(&second, "y")), "second session never mirrored");
    assert_eq!(stop(child)?, 0);
    Ok(())
}

#[test]
fn test_ignored_files_are_not_mirrored() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_source(".backtrailignore", "*.log\n")?;

    let mut child = bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()), "--yes").spawn()?;
    wait_for_stdout(&mut child, "Watching")?;
    let marker = ws.destination().join(".backtrailignore");
    assert!(wait_until(TIMEOUT, || marker.exists()));

    ws.write_source("debug.log", "noise")?;
    ws.write_source("kept.txt", "signal")?;
    let kept = ws.destination().join("kept.txt");
    assert!(wait_until(TIMEOUT, || has_content(&kept, "signal")));
    assert_eq!(stop(child)?, 0);

    assert!(!ws.destination().join("debug.log").exists());
    Ok(())
}

#[test]
fn test_stop_right_after_startup_is_clean() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_source("a.txt", "x")?;

    for _ in 0..3 {
        let mut child = bt!(ws, "watch", path_str(&ws.source()), path_str(&ws.destination()), "--yes").spawn()?;
        wait_for_stdout(&mut child, "Watching")?;
        assert_eq!(stop(child)?, 0);
        assert!(!ws.destination().join(".git/backtrail.lock").exists());
        assert!(!ws.destination().join(".git/index.lock").exists());
    }

    // The baseline was recorded once and later sessions found it
    let snapshots = snapshot_lines(&ws)?;
    assert_eq!(snapshots.len(), 1, "unexpected snapshots: {snapshots:#?}");
    Ok(())
}
