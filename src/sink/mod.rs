//! Persistence boundary for canonical rows.
//!
//! A sink appends every row of one [`DataSet`] or none of them. Sinks never create, alter or
//! drop the target table.

mod sqlite;

pub use sqlite::{SqliteSink, DEFAULT_BUSY_TIMEOUT};

use crate::error::IngestionResult;
use crate::types::DataSet;

/// Default target table name.
pub const DEFAULT_TABLE: &str = "EventLog";

/// Append-only destination for ingested rows.
pub trait EventSink: Send + Sync {
    /// Name of the target table, for logging.
    fn table(&self) -> &str;

    /// Append all rows of `data` atomically; returns the number of rows written.
    fn append(&self, data: &DataSet) -> IngestionResult<usize>;
}
