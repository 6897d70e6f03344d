use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by ingestion functions.
///
/// Every variant describes why a single file was rejected. None of them are fatal to the
/// process: callers log the error and move on to the next file.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The workbook could not be opened or decoded (corrupt, truncated, not a workbook).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// The workbook parsed but has a header row and no data rows.
    #[error("no data rows in {}", path.display())]
    EmptyData { path: PathBuf },

    /// The input does not conform to the column mapping (missing source columns, no header row, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A timestamp cell could not be interpreted as a date-time.
    #[error("failed to parse timestamp at row {row} column '{column}': {message} (raw='{raw}')")]
    TimestampParse {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// Connection failure, missing table, or constraint violation while appending rows.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Coarse classification of [`IngestionError`], used for matching in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionErrorKind {
    /// File unreadable or not in the expected tabular format.
    Parse,
    /// File parsed but contains no data rows.
    EmptyData,
    /// A required source column is missing.
    Schema,
    /// The timestamp column contains an unparseable value.
    TimestampParse,
    /// The bulk append failed.
    Persistence,
}

impl IngestionError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> IngestionErrorKind {
        match self {
            Self::Io(_) | Self::Excel(_) => IngestionErrorKind::Parse,
            Self::EmptyData { .. } => IngestionErrorKind::EmptyData,
            Self::SchemaMismatch { .. } => IngestionErrorKind::Schema,
            Self::TimestampParse { .. } => IngestionErrorKind::TimestampParse,
            Self::Persistence(_) => IngestionErrorKind::Persistence,
        }
    }
}
