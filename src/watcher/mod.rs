//! Folder watcher dispatching new spreadsheets to an [`Ingest`] implementation.
//!
//! The watcher moves through three states:
//!
//! - [`WatchState::Idle`]: constructed, not subscribed
//! - [`WatchState::Watching`]: a non-recursive filesystem subscription is active
//! - [`WatchState::Stopped`]: the subscription was released (terminal)
//!
//! Notifications arrive on the backend's thread and are queued on a channel; the watch loop
//! drains that channel on the calling thread and ingests one file at a time. A failed file is
//! counted, left on disk, and the loop carries on.

mod shutdown;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use thiserror::Error;

use crate::ingestion::{Ingest, IngestionObserver};

pub use shutdown::ShutdownSignal;

/// Extension of files picked up by default.
pub const DEFAULT_EXTENSION: &str = "xlsx";

// Excel writes `~$name.xlsx` owner files next to workbooks that are open.
const OFFICE_LOCK_PREFIX: &str = "~$";

/// Lifecycle state of a [`FolderWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
    Stopped,
}

/// Errors that prevent watching at all. Per-file ingestion errors never surface here.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch target is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher cannot start from state {0:?}")]
    InvalidState(WatchState),
}

/// Tunables for the watch loop.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Upper bound on how long the loop blocks before re-checking the shutdown signal.
    pub poll_interval: Duration,
    /// Pause between detecting a file and reading it, so the writer can finish.
    pub settle_delay: Duration,
    /// File extension to ingest (compared ASCII case-insensitively, without the dot).
    pub extension: String,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_millis(500),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// Running counters for one watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Matching files handed to the ingestor.
    pub detected: u64,
    /// Files ingested successfully.
    pub ingested: u64,
    /// Files whose ingestion failed (left on disk, not retried).
    pub failed: u64,
    /// Created entries that were not candidates (directories, other extensions, lock files).
    pub ignored: u64,
}

/// Receives creation notifications for entries in the watched directory.
pub trait CreationHandler {
    fn on_file_created(&mut self, path: &Path);
}

/// Watches one directory and ingests every new spreadsheet created in it.
pub struct FolderWatcher<I> {
    target: PathBuf,
    ingestor: I,
    observer: Arc<dyn IngestionObserver>,
    options: WatchOptions,
    state: WatchState,
    stats: WatchStats,
    // Last path handed to `on_file_created` by a create or rename-in notification.
    last_arrival: Option<PathBuf>,
}

impl<I: Ingest> FolderWatcher<I> {
    pub fn new(target: impl Into<PathBuf>, ingestor: I, observer: Arc<dyn IngestionObserver>) -> Self {
        Self {
            target: target.into(),
            ingestor,
            observer,
            options: WatchOptions::default(),
            state: WatchState::Idle,
            stats: WatchStats::default(),
            last_arrival: None,
        }
    }

    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    pub fn ingestor(&self) -> &I {
        &self.ingestor
    }

    /// Subscribe to the target directory and ingest new files until `shutdown` is triggered.
    ///
    /// Blocks the calling thread. Returns once the subscription has been released; a file
    /// being ingested when shutdown is requested is finished first.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<(), WatchError> {
        self.ensure_idle()?;
        if !self.target.is_dir() {
            return Err(WatchError::NotADirectory(self.target.clone()));
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&self.target, RecursiveMode::NonRecursive)?;

        self.begin();
        self.drain(&rx, shutdown);

        if let Err(e) = watcher.unwatch(&self.target) {
            tracing::debug!(dir = %self.target.display(), error = %e, "unwatch failed");
        }
        drop(watcher);
        self.finish();
        Ok(())
    }

    /// Same loop as [`Self::run`], fed from an existing notification channel.
    ///
    /// Stops when `shutdown` is triggered or every sender of `events` has been dropped.
    pub fn run_with_events(
        &mut self,
        events: &Receiver<notify::Result<Event>>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), WatchError> {
        self.ensure_idle()?;
        self.begin();
        self.drain(events, shutdown);
        self.finish();
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), WatchError> {
        match self.state {
            WatchState::Idle => Ok(()),
            other => Err(WatchError::InvalidState(other)),
        }
    }

    fn begin(&mut self) {
        self.state = WatchState::Watching;
        self.observer.on_watch_started(&self.target);
    }

    fn finish(&mut self) {
        self.state = WatchState::Stopped;
        self.observer.on_watch_stopped(&self.target);
    }

    fn drain(&mut self, events: &Receiver<notify::Result<Event>>, shutdown: &ShutdownSignal) {
        while !shutdown.is_triggered() {
            match events.recv_timeout(self.options.poll_interval) {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(e)) => tracing::warn!(dir = %self.target.display(), error = %e, "filesystem notification error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!(dir = %self.target.display(), "notification channel closed");
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => {
                self.stats.ignored += event.paths.len() as u64;
            }
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in event.paths {
                    self.arrived(path);
                }
            }
            // inotify follows the `To` of an in-folder rename with a `Both` carrying `[from, to]`.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let Some(path) = event.paths.into_iter().last() {
                    self.arrived_again(path);
                }
            }
            // Backends that cannot tell the direction: only the side that still exists arrived.
            // FSEvents may also have reported the same path as created just before.
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                for path in event.paths.into_iter().filter(|p| p.exists()) {
                    self.arrived_again(path);
                }
            }
            _ => {}
        }
    }

    fn arrived(&mut self, path: PathBuf) {
        self.on_file_created(&path);
        self.last_arrival = Some(path);
    }

    // A follow-up notification for the path just handled is dropped once; anything else is new.
    fn arrived_again(&mut self, path: PathBuf) {
        if self.last_arrival.as_ref() == Some(&path) {
            self.last_arrival = None;
            tracing::debug!(path = %path.display(), "duplicate rename notification");
            return;
        }
        self.arrived(path);
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.options.extension));
        let lock_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(OFFICE_LOCK_PREFIX));

        ext_matches && !lock_file && !path.is_dir()
    }
}

impl<I: Ingest> CreationHandler for FolderWatcher<I> {
    fn on_file_created(&mut self, path: &Path) {
        if !self.is_candidate(path) {
            self.stats.ignored += 1;
            tracing::debug!(path = %path.display(), "ignoring non-spreadsheet entry");
            return;
        }

        self.stats.detected += 1;
        self.observer.on_detected(path);
        if !self.options.settle_delay.is_zero() {
            std::thread::sleep(self.options.settle_delay);
        }

        let ingestor = &self.ingestor;
        match panic::catch_unwind(AssertUnwindSafe(|| ingestor.ingest(path))) {
            Ok(Ok(stats)) => {
                self.stats.ingested += 1;
                tracing::debug!(path = %path.display(), rows = stats.rows, "ingestion finished");
            }
            Ok(Err(e)) => {
                self.stats.failed += 1;
                tracing::debug!(
                    path = %path.display(),
                    kind = ?e.kind(),
                    "file left unprocessed; it will not be retried"
                );
            }
            Err(payload) => {
                self.stats.failed += 1;
                tracing::error!(
                    path = %path.display(),
                    panic = panic_message(payload.as_ref()),
                    "ingestion panicked; file left unprocessed"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{CreationHandler, FolderWatcher, WatchOptions};
    use crate::error::IngestionResult;
    use crate::ingestion::{Ingest, IngestionStats, TracingObserver};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl Ingest for Recorder {
        fn ingest(&self, path: &Path) -> IngestionResult<IngestionStats> {
            self.seen.lock().unwrap().push(path.to_path_buf());
            Ok(IngestionStats { rows: 1 })
        }
    }

    fn watcher(dir: &Path) -> FolderWatcher<Recorder> {
        FolderWatcher::new(dir, Recorder::default(), Arc::new(TracingObserver)).with_options(WatchOptions {
            poll_interval: Duration::from_millis(10),
            settle_delay: Duration::ZERO,
            ..WatchOptions::default()
        })
    }

    #[test]
    fn extension_match_is_case_insensitive_and_skips_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = watcher(dir.path());

        w.on_file_created(&dir.path().join("REPORT.XLSX"));
        w.on_file_created(&dir.path().join("~$report.xlsx"));
        w.on_file_created(&dir.path().join("report.xlsx.tmp"));
        w.on_file_created(&dir.path().join("report"));

        let seen = w.ingestor().seen.lock().unwrap().clone();
        assert_eq!(seen, vec![dir.path().join("REPORT.XLSX")]);
        assert_eq!(w.stats().detected, 1);
        assert_eq!(w.stats().ignored, 3);
    }

    #[test]
    fn directory_named_like_a_workbook_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("archive.xlsx");
        std::fs::create_dir(&sub).unwrap();

        let mut w = watcher(dir.path());
        w.on_file_created(&sub);
        assert!(w.ingestor().seen.lock().unwrap().is_empty());
        assert_eq!(w.stats().ignored, 1);
    }

    struct Panicking;

    impl Ingest for Panicking {
        fn ingest(&self, _path: &Path) -> IngestionResult<IngestionStats> {
            panic!("decoder blew up");
        }
    }

    #[test]
    fn panicking_ingestion_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = FolderWatcher::new(dir.path(), Panicking, Arc::new(TracingObserver)).with_options(WatchOptions {
            settle_delay: Duration::ZERO,
            ..WatchOptions::default()
        });

        w.on_file_created(&dir.path().join("a.xlsx"));
        w.on_file_created(&dir.path().join("b.xlsx"));
        assert_eq!(w.stats().failed, 2);
        assert_eq!(w.stats().detected, 2);
    }
}
