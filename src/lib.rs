//! `eventlog-ingest` watches a folder for new Excel event exports and appends each one to an
//! `EventLog` table.
//!
//! For every `.xlsx` created in the watched folder:
//!
//! 1. the first worksheet (or a configured one) is read, header row first
//! 2. header labels are renamed per a fixed [`mapping::ColumnMapping`]; unmapped columns are dropped
//! 3. `Timestamp [Local]` becomes `EventTimestamp`, shifted forward by 15 minutes
//! 4. all rows are appended to the table in one transaction, or none are
//!
//! A file that fails any step is logged and left on disk; the watcher keeps going.
//!
//! ## Quick example: ingest one file
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use eventlog_ingest::ingestion::{Ingest, IngestionOptions, Ingestor, TracingObserver};
//! use eventlog_ingest::mapping::ColumnMapping;
//! use eventlog_ingest::sink::SqliteSink;
//!
//! # fn main() -> Result<(), eventlog_ingest::IngestionError> {
//! let ingestor = Ingestor::new(
//!     Arc::new(ColumnMapping::event_log()),
//!     Box::new(SqliteSink::new("events.db")),
//!     IngestionOptions {
//!         observer: Some(Arc::new(TracingObserver)),
//!         ..Default::default()
//!     },
//! );
//! let stats = ingestor.ingest(Path::new("drop/shift-report.xlsx"))?;
//! println!("rows={}", stats.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Watching a folder
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eventlog_ingest::ingestion::{IngestionOptions, Ingestor, TracingObserver};
//! use eventlog_ingest::mapping::ColumnMapping;
//! use eventlog_ingest::sink::SqliteSink;
//! use eventlog_ingest::watcher::{FolderWatcher, ShutdownSignal};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let observer = Arc::new(TracingObserver);
//! let ingestor = Ingestor::new(
//!     Arc::new(ColumnMapping::event_log()),
//!     Box::new(SqliteSink::new("events.db")),
//!     IngestionOptions {
//!         observer: Some(observer.clone()),
//!         ..Default::default()
//!     },
//! );
//!
//! let shutdown = ShutdownSignal::new();
//! let mut watcher = FolderWatcher::new("drop", ingestor, observer);
//! watcher.run(&shutdown)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: workbook reading, timestamp normalization and the ingest pipeline
//! - [`watcher`]: folder watch loop and shutdown signal
//! - [`sink`]: persistence boundary (SQLite)
//! - [`mapping`]: source-label to canonical-field mapping
//! - [`types`]: canonical schema + in-memory dataset types
//! - [`config`], [`logging`]: process startup
//! - [`error`]: error types used across ingestion

pub mod config;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod mapping;
pub mod sink;
pub mod types;
pub mod watcher;

pub use error::{IngestionError, IngestionErrorKind, IngestionResult};
