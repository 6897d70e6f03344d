//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`Ingestor`] (from [`pipeline`]) which:
//!
//! - reads the first (or a named) worksheet of an Excel workbook
//! - renames columns per a [`crate::mapping::ColumnMapping`] and shifts `EventTimestamp`
//! - appends the rows through an [`crate::sink::EventSink`] in one transaction
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Lower-level pieces are available under:
//! - [`excel`]
//! - [`timestamp`]

pub mod excel;
pub mod observability;
pub mod pipeline;
pub mod timestamp;

pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver,
};
pub use pipeline::{ingest_from_path, load_canonical, to_canonical, Ingest, IngestionOptions, Ingestor};
pub use timestamp::EVENT_TIMESTAMP_OFFSET_MINUTES;
