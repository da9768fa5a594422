//! Lock file guarding a destination against concurrent sessions
//!
//! Two sessions writing the same index would interleave stages and commits.
//! The lock lives inside the destination's `.git` directory so it never shows
//! up in a snapshot.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "backtrail.lock";

/// Exclusive lock on one destination for the session's lifetime
#[derive(Debug)]
pub struct DestinationLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
}

impl DestinationLock {
    /// Acquire the lock in `git_dir`
    ///
    /// Fails when another live session holds it. A lock file left behind by a
    /// session that died is reclaimed.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let lock_path = git_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        if !try_flock_exclusive(&file)? {
            let holder = read_lock_content(&mut file)
                .map(|content| content.pid.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            anyhow::bail!(
                "Another backtrail session (pid {holder}) is already backing up to {}",
                git_dir.parent().unwrap_or(git_dir).display()
            );
        }

        if let Ok(previous) = read_lock_content(&mut file) {
            if previous.pid != std::process::id() && is_process_alive(previous.pid) {
                warn!(pid = previous.pid, "lock file names a live process but was not locked, taking over");
            } else {
                debug!(pid = previous.pid, "reclaiming stale lock");
            }
        }

        write_lock_content(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Write lock content (PID + timestamp)
fn write_lock_content(file: &mut File) -> Result<()> {
    let content = LockContent {
        pid: std::process::id(),
        started_at: current_timestamp_ms(),
    };

    let serialized = serde_json::to_string(&content).context("Failed to serialize lock content")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_lock_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let content: LockContent = serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
    Ok(content)
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// No advisory locking here; the pid check in the file is all we have
#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Null signal: existence check only
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM: exists, owned by someone else
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
