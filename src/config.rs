//! Process settings, resolved once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::error::IngestionError;
use crate::mapping::ColumnMapping;
use crate::sink::DEFAULT_TABLE;
use crate::watcher::WatchOptions;

/// Errors raised while resolving [`Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("watch directory does not exist or is not a directory: {}", .0.display())]
    WatchDirMissing(PathBuf),

    #[error("database file not found: {}", .0.display())]
    DatabaseMissing(PathBuf),

    #[error("table name must not be empty")]
    EmptyTable,

    #[error("failed to load column mapping from {}: {source}", path.display())]
    Mapping {
        path: PathBuf,
        #[source]
        source: IngestionError,
    },
}

/// Everything the watcher process needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory to watch (non-recursive).
    pub watch_dir: PathBuf,
    /// Existing SQLite database holding the target table.
    pub database: PathBuf,
    /// Target table.
    pub table: String,
    /// Worksheet to read; first sheet when `None`.
    pub sheet: Option<String>,
    /// Column mapping, built-in unless loaded from a file.
    pub mapping: ColumnMapping,
    /// Watch loop tunables.
    pub watch: WatchOptions,
}

impl Settings {
    /// Settings with the built-in mapping and default table/timings.
    pub fn new(watch_dir: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            database: database.into(),
            table: DEFAULT_TABLE.to_string(),
            sheet: None,
            mapping: ColumnMapping::event_log(),
            watch: WatchOptions::default(),
        }
    }

    /// Replace the built-in mapping with one loaded from a JSON file.
    pub fn with_mapping_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.mapping = ColumnMapping::from_json_path(path).map_err(|source| ConfigError::Mapping {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.watch.poll_interval = interval;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.watch.settle_delay = delay;
        self
    }

    /// Check that the watch directory and database exist and the table name is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.watch_dir.is_dir() {
            return Err(ConfigError::WatchDirMissing(self.watch_dir.clone()));
        }
        if !self.database.is_file() {
            return Err(ConfigError::DatabaseMissing(self.database.clone()));
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        Ok(())
    }
}
