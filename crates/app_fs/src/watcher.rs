//! File system watcher built on notify
//!
//! Raw (undebounced) events are converted into `ChangeEvent`s and handed to
//! a sink. Rename halves reported separately are paired by tracker cookie;
//! a rename-from half left unpaired for `RENAME_PAIR_TIMEOUT` is reported as
//! a removal.

use crate::{ChangeEvent, FsError, Locator, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const RENAME_PAIR_TIMEOUT: Duration = Duration::from_millis(500);
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

type Sink = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Watches one container (and its parent, so that renames and removal of
/// the container itself are reported).
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    watched_paths: Vec<PathBuf>,
    pairer: Arc<Mutex<RenamePairer>>,
    sink: Sink,
    stop: Arc<AtomicBool>,
    flusher: Option<JoinHandle<()>>,
}

impl FsWatcher {
    /// Create a watcher delivering converted events to `sink`.
    ///
    /// `sink` runs on notify's thread, and on the flush thread for expired
    /// rename halves.
    pub fn new<F>(sink: F) -> Result<Self>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let pairer = Arc::new(Mutex::new(RenamePairer::default()));
        let sink: Sink = Arc::new(sink);

        let watcher = {
            let pairer = pairer.clone();
            let sink = sink.clone();
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let changes = pairer.lock().convert(event);
                    for change in changes {
                        sink(change);
                    }
                }
                Err(e) => tracing::warn!("Watcher error: {:?}", e),
            })?
        };

        let stop = Arc::new(AtomicBool::new(false));
        let flusher = {
            let pairer = pairer.clone();
            let sink = sink.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("watch-flush".into())
                .spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        thread::sleep(FLUSH_INTERVAL);
                        let expired = pairer.lock().expire(Instant::now(), RENAME_PAIR_TIMEOUT);
                        if let Some(change) = expired {
                            tracing::debug!("Unpaired rename reported as removal");
                            sink(change);
                        }
                    }
                })?
        };

        Ok(Self {
            watcher,
            watched_paths: Vec::new(),
            pairer,
            sink,
            stop,
            flusher: Some(flusher),
        })
    }

    /// Switch to watching `container`, dropping any previous watches.
    /// An open rename half from the previous watch is reported first.
    pub fn watch(&mut self, container: &Locator) -> Result<()> {
        let pending = self.pairer.lock().flush();
        if let Some(change) = pending {
            (self.sink)(change);
        }
        self.unwatch_all();

        self.watcher
            .watch(container.as_path(), RecursiveMode::NonRecursive)?;
        self.watched_paths.push(container.to_path_buf());

        if let Some(parent) = container.parent() {
            // The parent may be unreadable; losing container-rename events is
            // acceptable there
            match self.watcher.watch(parent.as_path(), RecursiveMode::NonRecursive) {
                Ok(()) => self.watched_paths.push(parent.to_path_buf()),
                Err(e) => tracing::debug!("Not watching parent {}: {}", parent, e),
            }
        }

        tracing::info!("Watching: {}", container);
        Ok(())
    }

    pub fn unwatch_all(&mut self) {
        for path in self.watched_paths.drain(..) {
            if let Err(e) = self.watcher.unwatch(&path) {
                tracing::debug!("Unwatch {} failed: {}", path.display(), e);
            }
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.unwatch_all();
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.flusher.take() {
            let _ = handle.join();
        }
    }
}

impl From<notify::Error> for FsError {
    fn from(e: notify::Error) -> Self {
        FsError::Watch(e.to_string())
    }
}

/// Turns raw notify events into change events.
#[derive(Default)]
struct RenamePairer {
    /// A rename-from half waiting for its rename-to, and when it arrived
    pending_from: Option<(Option<usize>, PathBuf, Instant)>,
}

impl RenamePairer {
    /// Give up on a rename-from half older than `timeout`
    fn expire(&mut self, now: Instant, timeout: Duration) -> Option<ChangeEvent> {
        let expired = matches!(
            &self.pending_from,
            Some((_, _, since)) if now.saturating_duration_since(*since) >= timeout
        );
        if expired {
            self.flush()
        } else {
            None
        }
    }

    /// Report any open rename-from half as a removal
    fn flush(&mut self) -> Option<ChangeEvent> {
        self.pending_from
            .take()
            .map(|(_, from, _)| ChangeEvent::removed(from))
    }

    fn convert(&mut self, event: Event) -> Vec<ChangeEvent> {
        let mut out = Vec::new();

        if let EventKind::Modify(ModifyKind::Name(RenameMode::To)) = event.kind {
            let tracker = event.attrs.tracker();
            for to in event.paths {
                match self.pending_from.take() {
                    Some((from_tracker, from, _)) if from_tracker == tracker => {
                        out.push(ChangeEvent::renamed(from, to));
                    }
                    other => {
                        // Unpaired halves: moved out and moved in
                        if let Some((_, from, _)) = other {
                            out.push(ChangeEvent::removed(from));
                        }
                        out.push(ChangeEvent::created(to));
                    }
                }
            }
            return out;
        }

        // Any other event closes an open rename: the item left the watch
        out.extend(self.flush());

        if event.need_rescan() {
            out.extend(event.paths.into_iter().map(ChangeEvent::contents_changed));
            return out;
        }

        match event.kind {
            EventKind::Create(_) => {
                out.extend(event.paths.into_iter().map(ChangeEvent::created));
            }
            EventKind::Remove(_) => {
                out.extend(event.paths.into_iter().map(ChangeEvent::removed));
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                    out.push(ChangeEvent::renamed(from, to));
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                let tracker = event.attrs.tracker();
                if let Some(from) = event.paths.into_iter().next() {
                    self.pending_from = Some((tracker, from, Instant::now()));
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                // Backends that cannot tell the direction of a rename
                for path in event.paths {
                    if path.exists() {
                        out.push(ChangeEvent::created(path));
                    } else {
                        out.push(ChangeEvent::removed(path));
                    }
                }
            }
            EventKind::Modify(_) => {
                out.extend(event.paths.into_iter().map(ChangeEvent::modified));
            }
            EventKind::Access(_) => {}
            EventKind::Any | EventKind::Other => {
                out.extend(event.paths.into_iter().map(ChangeEvent::contents_changed));
            }
        }

        out
    }
}
