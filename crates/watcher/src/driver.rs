//! Watch loop
//!
//! Drains watcher notices one at a time into a [`Reconciler`] until the
//! notification source ends or the session's [`ShutdownToken`] fires. One
//! failing event is logged and never ends the loop.

use crate::events::Notice;
use crate::reconcile::{Outcome, Reconciler};
use backtrail_core::{RawEvent, ShutdownToken};
use backtrail_store::SnapshotStore;
use crossbeam_channel::{select, Receiver};
use tracing::{debug, error, info};

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop was requested through the token
    Stopped,
    /// The notifier went away, or the watched root no longer exists
    SourceEnded,
}

/// Counters for one watch session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub events: u64,
    pub commits: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Final state of a watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub stats: LoopStats,
}

/// Run the watch loop on the current thread
///
/// Blocks until stopped; call from a dedicated thread.
pub fn run<S: SnapshotStore>(
    reconciler: &mut Reconciler<S>,
    notices: &Receiver<Notice>,
    token: &ShutdownToken,
) -> LoopReport {
    let mut stats = LoopStats::default();
    let exit = drain(reconciler, notices, token, &mut stats);

    info!(
        exit = ?exit,
        events = stats.events,
        commits = stats.commits,
        skipped = stats.skipped,
        failed = stats.failed,
        "watch loop finished"
    );
    LoopReport { exit, stats }
}

fn drain<S: SnapshotStore>(
    reconciler: &mut Reconciler<S>,
    notices: &Receiver<Notice>,
    token: &ShutdownToken,
    stats: &mut LoopStats,
) -> LoopExit {
    loop {
        if token.is_cancelled() {
            return LoopExit::Stopped;
        }

        let notice = select! {
            recv(notices) -> msg => match msg {
                Ok(notice) => notice,
                Err(_) => {
                    info!("notification source closed");
                    return LoopExit::SourceEnded;
                }
            },
            recv(token.receiver()) -> _ => return LoopExit::Stopped,
        };

        // A stop that raced with the dequeue wins over the event
        if token.is_cancelled() {
            return LoopExit::Stopped;
        }

        match notice {
            Notice::Event(event) => {
                stats.events += 1;
                info!(event = %event, "event");

                if event.path().is_none() && !root_exists(reconciler) {
                    return LoopExit::SourceEnded;
                }

                reconcile_one(reconciler, &event, stats);
            }
            Notice::Error(err) => {
                error!(error = %err, "watcher error");
                if !root_exists(reconciler) {
                    return LoopExit::SourceEnded;
                }
            }
        }
    }
}

fn reconcile_one<S: SnapshotStore>(reconciler: &mut Reconciler<S>, event: &RawEvent, stats: &mut LoopStats) {
    match reconciler.handle(event) {
        Ok(Outcome::Committed(id)) => {
            stats.commits += 1;
            debug!(id = %id.short(), "snapshot recorded");
        }
        Ok(Outcome::Skipped(reason)) => {
            stats.skipped += 1;
            debug!(%reason, "no snapshot");
        }
        Err(err) => {
            stats.failed += 1;
            error!(event = %event, error = ?err, "failed to reconcile event");
        }
    }
}

fn root_exists<S: SnapshotStore>(reconciler: &Reconciler<S>) -> bool {
    let root = reconciler.source_root();
    if root.is_dir() {
        return true;
    }
    info!(root = %root.display(), "watched root is gone");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Watcher;
    use crate::ignore::IgnoreRules;
    use backtrail_core::{Layout, PathTranslator, RawEventKind};
    use backtrail_store::GitStore;
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn setup(source: &Path, dest: &Path) -> Reconciler<GitStore> {
        let mut store = GitStore::new(dest);
        store.initialize().unwrap();
        Reconciler::new(
            PathTranslator::new(source, dest, Layout::Relative),
            store,
            IgnoreRules::builtin_only(source),
        )
    }

    #[test]
    fn test_drains_until_source_closes() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "x").unwrap();
        let mut reconciler = setup(source.path(), dest.path());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Notice::Event(RawEvent::changed("a.txt"))).unwrap();
        tx.send(Notice::Event(RawEvent::new(RawEventKind::Unknown, Some("a.txt".into()))))
            .unwrap();
        drop(tx);

        let report = run(&mut reconciler, &rx, &ShutdownToken::new());

        assert_eq!(report.exit, LoopExit::SourceEnded);
        assert_eq!(
            report.stats,
            LoopStats {
                events: 2,
                commits: 1,
                skipped: 1,
                failed: 0
            }
        );
    }

    #[test]
    fn test_failed_event_does_not_stop_the_loop() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("blocked")).unwrap();
        fs::write(source.path().join("blocked/a.txt"), "x").unwrap();
        fs::write(source.path().join("b.txt"), "y").unwrap();
        // Destination needs a directory where a file sits
        fs::write(dest.path().join("blocked"), "in the way").unwrap();
        let mut reconciler = setup(source.path(), dest.path());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Notice::Event(RawEvent::changed("blocked/a.txt"))).unwrap();
        tx.send(Notice::Event(RawEvent::changed("b.txt"))).unwrap();
        drop(tx);

        let report = run(&mut reconciler, &rx, &ShutdownToken::new());

        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.commits, 1);
        assert_eq!(fs::read_to_string(dest.path().join("b.txt")).unwrap(), "y");
    }

    #[test]
    fn test_cancelled_token_stops_before_reconciling() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "x").unwrap();
        let mut reconciler = setup(source.path(), dest.path());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Notice::Event(RawEvent::changed("a.txt"))).unwrap();

        let token = ShutdownToken::new();
        token.cancel();
        let report = run(&mut reconciler, &rx, &token);

        assert_eq!(report.exit, LoopExit::Stopped);
        assert_eq!(report.stats, LoopStats::default());
        assert!(!dest.path().join("a.txt").exists());
    }

    #[test]
    fn test_cancel_wakes_blocked_loop() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut reconciler = setup(source.path(), dest.path());

        // Sender stays alive, so only the token can end the loop
        let (_tx, rx) = crossbeam_channel::unbounded::<Notice>();
        let token = ShutdownToken::new();
        let canceller = token.clone();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let report = run(&mut reconciler, &rx, &token);
        stopper.join().unwrap();
        assert_eq!(report.exit, LoopExit::Stopped);
    }

    #[test]
    fn test_vanished_root_ends_the_loop() {
        let parent = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = parent.path().join("watched");
        fs::create_dir(&source).unwrap();
        let mut reconciler = setup(&source, dest.path());
        fs::remove_dir(&source).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Notice::Event(RawEvent::changed(""))).unwrap();
        tx.send(Notice::Event(RawEvent::changed("never-reached.txt"))).unwrap();

        let report = run(&mut reconciler, &rx, &ShutdownToken::new());

        assert_eq!(report.exit, LoopExit::SourceEnded);
        assert_eq!(report.stats.events, 1);
    }

    #[test]
    fn test_live_watch_mirrors_new_file() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source_root = source.path().canonicalize().unwrap();
        let dest_root = dest.path().canonicalize().unwrap();

        let watcher = Watcher::new(&source_root).unwrap();
        let notices = watcher.notices().clone();
        let token = ShutdownToken::new();

        let mut reconciler = setup(&source_root, &dest_root);
        let loop_token = token.clone();
        let handle = thread::spawn(move || {
            let report = run(&mut reconciler, &notices, &loop_token);
            (report, reconciler.into_store())
        });

        fs::write(source_root.join("live.txt"), "hello").unwrap();

        let mirrored = dest_root.join("live.txt");
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if fs::read_to_string(&mirrored).map(|c| c == "hello").unwrap_or(false) {
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }

        token.cancel();
        let (report, store) = handle.join().unwrap();
        drop(watcher);

        assert_eq!(report.exit, LoopExit::Stopped);
        assert_eq!(fs::read_to_string(&mirrored).unwrap(), "hello");
        assert!(store.is_tracked(&mirrored).unwrap());
    }
}
