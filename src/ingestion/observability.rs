//! Callbacks for watch and ingestion events, and the `tracing` implementation used by the binary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::IngestionError;

/// How bad a failed file is. Ordered, so it doubles as an alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Nothing to load (empty sheet).
    Warning,
    /// The file itself is unusable.
    Error,
    /// The store or filesystem is unusable; later files will likely fail too.
    Critical,
}

impl IngestionSeverity {
    /// Severity assigned to an ingestion failure.
    pub fn for_error(e: &IngestionError) -> Self {
        match e {
            IngestionError::Io(_) => Self::Critical,
            IngestionError::Persistence(_) => Self::Critical,
            IngestionError::EmptyData { .. } => Self::Warning,
            IngestionError::Excel(_) | IngestionError::SchemaMismatch { .. } | IngestionError::TimestampParse { .. } => {
                Self::Error
            }
        }
    }
}

/// Which file went where.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Rows appended to the table.
    pub rows: usize,
}

/// Observer interface for watch and ingestion events.
///
/// This is the logging component handed to both the watcher and the ingestor at construction.
/// Every method has a no-op default so implementors pick the events they care about.
pub trait IngestionObserver: Send + Sync {
    /// Called once the watch subscription is registered.
    fn on_watch_started(&self, _dir: &Path) {}

    /// Called after the watch subscription is released.
    fn on_watch_stopped(&self, _dir: &Path) {}

    /// Called when a new spreadsheet is detected, before it is ingested.
    fn on_detected(&self, _path: &Path) {}

    /// Called when ingestion succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when ingestion fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when an ingestion failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Forwards every callback to each inner observer, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_watch_started(&self, dir: &Path) {
        for o in &self.observers {
            o.on_watch_started(dir);
        }
    }

    fn on_watch_stopped(&self, dir: &Path) {
        for o in &self.observers {
            o.on_watch_stopped(dir);
        }
    }

    fn on_detected(&self, path: &Path) {
        for o in &self.observers {
            o.on_detected(path);
        }
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs watch and ingestion events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_watch_started(&self, dir: &Path) {
        tracing::info!(dir = %dir.display(), "Monitoring folder for new files");
    }

    fn on_watch_stopped(&self, dir: &Path) {
        tracing::info!(dir = %dir.display(), "Stopped monitoring");
    }

    fn on_detected(&self, path: &Path) {
        tracing::info!(path = %path.display(), "New file detected");
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            path = %ctx.path.display(),
            table = %ctx.table,
            rows = stats.rows,
            "File loaded"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        let kind = error.kind();
        match severity {
            IngestionSeverity::Warning => {
                tracing::warn!(path = %ctx.path.display(), ?kind, error = %error, "File skipped")
            }
            IngestionSeverity::Error | IngestionSeverity::Critical => {
                tracing::error!(
                    path = %ctx.path.display(),
                    table = %ctx.table,
                    ?kind,
                    ?severity,
                    error = %error,
                    "Failed to load file"
                )
            }
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            alert = true,
            path = %ctx.path.display(),
            kind = ?error.kind(),
            ?severity,
            "Ingestion alert"
        );
    }
}
