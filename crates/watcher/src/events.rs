//! Recursive subscription to filesystem notifications
//!
//! The notify callback does nothing but translate each notification into
//! [`RawEvent`]s relative to the watched root and push them onto an unbounded
//! channel. All interpretation happens later, on the reconciler's thread.

use backtrail_core::path::strip_root;
use backtrail_core::{RawEvent, RawEventKind};
use crossbeam_channel::{Receiver, Sender};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Item delivered by a [`Watcher`]
#[derive(Debug)]
pub enum Notice {
    Event(RawEvent),
    /// The notifier reported a problem (queue overflow, watch lost, ...)
    Error(notify::Error),
}

/// Live recursive watch on the source tree
///
/// Dropping the watcher releases the subscription; the receiver then reports
/// disconnection once drained.
pub struct Watcher {
    root: PathBuf,
    inner: RecommendedWatcher,
    notices: Receiver<Notice>,
}

impl Watcher {
    /// Subscribe to recursive notifications rooted at `root`
    pub fn new(root: &Path) -> notify::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let callback_root = root.to_path_buf();

        let mut inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
            forward(&callback_root, res, &tx);
        })?;
        inner.watch(root, RecursiveMode::Recursive)?;

        debug!(root = %root.display(), "watching");
        Ok(Self {
            root: root.to_path_buf(),
            inner,
            notices: rx,
        })
    }

    pub fn notices(&self) -> &Receiver<Notice> {
        &self.notices
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching
    pub fn stop(mut self) -> notify::Result<()> {
        let root = self.root.clone();
        self.inner.unwatch(&root)
    }
}

fn forward(root: &Path, res: notify::Result<Event>, tx: &Sender<Notice>) {
    let notices: Vec<Notice> = match res {
        Ok(event) => raw_events(root, &event).into_iter().map(Notice::Event).collect(),
        Err(err) => vec![Notice::Error(err)],
    };
    for notice in notices {
        // Receiver gone means the session is over
        if tx.send(notice).is_err() {
            return;
        }
    }
}

/// Classify a notify event kind
pub fn raw_kind(kind: &EventKind) -> RawEventKind {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => RawEventKind::Changed,
        // Writer closed the file: the content is complete
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => RawEventKind::Changed,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => RawEventKind::Unknown,
    }
}

/// Translate one notify event into raw events, one per reported path
pub fn raw_events(root: &Path, event: &Event) -> Vec<RawEvent> {
    let kind = raw_kind(&event.kind);

    if event.paths.is_empty() {
        return vec![RawEvent::new(kind, None)];
    }

    event
        .paths
        .iter()
        .map(|path| RawEvent::new(kind, strip_root(root, path)))
        .collect()
}
