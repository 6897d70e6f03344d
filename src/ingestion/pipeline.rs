//! File-to-table ingestion.
//!
//! Most callers should use [`Ingestor`], which bundles the column mapping, the sink and
//! [`IngestionOptions`]. [`ingest_from_path`] is the same operation as a free function, and
//! [`load_canonical`] runs every step except the append.
//!
//! If an [`IngestionObserver`] is configured, success/failure/alerts are reported to it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use calamine::Data;

use crate::error::{IngestionError, IngestionResult};
use crate::mapping::ColumnMapping;
use crate::sink::EventSink;
use crate::types::{DataSet, DataType, Value};

use super::excel::{read_excel_sheet, RawTable};
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::timestamp::{excel_serial_to_datetime, normalize_event_timestamp};

/// Options controlling ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Worksheet to read. `None` reads the first sheet.
    pub sheet: Option<String>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("sheet", &self.sheet)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Something that can ingest one file. The watcher dispatches through this.
pub trait Ingest {
    /// Ingest `path`, appending all of its rows or none of them.
    fn ingest(&self, path: &Path) -> IngestionResult<IngestionStats>;
}

/// Converts spreadsheet files into appended rows of the target table.
pub struct Ingestor {
    mapping: Arc<ColumnMapping>,
    sink: Box<dyn EventSink>,
    options: IngestionOptions,
}

impl Ingestor {
    /// Create an ingestor writing through `sink`.
    pub fn new(mapping: Arc<ColumnMapping>, sink: Box<dyn EventSink>, options: IngestionOptions) -> Self {
        Self { mapping, sink, options }
    }

    /// The mapping this ingestor renames columns with.
    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Options in effect.
    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("mapped_columns", &self.mapping.len())
            .field("table", &self.sink.table())
            .field("options", &self.options)
            .finish()
    }
}

impl Ingest for Ingestor {
    fn ingest(&self, path: &Path) -> IngestionResult<IngestionStats> {
        ingest_from_path(path, &self.mapping, self.sink.as_ref(), &self.options)
    }
}

/// Ingest one spreadsheet into the sink's table.
///
/// Steps: read the sheet, reject empty input, rename mapped columns (dropping the rest), shift
/// `EventTimestamp` by 15 minutes, project to the canonical columns, then append everything in
/// one transaction. Any failure leaves the table untouched.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with row count stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```no_run
/// use eventlog_ingest::ingestion::{ingest_from_path, IngestionOptions};
/// use eventlog_ingest::mapping::ColumnMapping;
/// use eventlog_ingest::sink::SqliteSink;
///
/// # fn main() -> Result<(), eventlog_ingest::IngestionError> {
/// let sink = SqliteSink::new("events.db");
/// let stats = ingest_from_path(
///     "drop/2024-01-01.xlsx",
///     &ColumnMapping::event_log(),
///     &sink,
///     &IngestionOptions::default(),
/// )?;
/// println!("rows={}", stats.rows);
/// # Ok(())
/// # }
/// ```
pub fn ingest_from_path(
    path: impl AsRef<Path>,
    mapping: &ColumnMapping,
    sink: &dyn EventSink,
    options: &IngestionOptions,
) -> IngestionResult<IngestionStats> {
    let path = path.as_ref();
    let ctx = IngestionContext {
        path: path.to_path_buf(),
        table: sink.table().to_string(),
    };

    let result = load_canonical(path, mapping, options.sheet.as_deref())
        .and_then(|ds| sink.append(&ds))
        .map(|rows| IngestionStats { rows });

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(stats) => obs.on_success(&ctx, *stats),
            Err(e) => {
                let sev = IngestionSeverity::for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// Read a spreadsheet and transform it into canonical records without persisting anything.
pub fn load_canonical(path: &Path, mapping: &ColumnMapping, sheet: Option<&str>) -> IngestionResult<DataSet> {
    let raw = read_excel_sheet(path, sheet)?;
    if raw.rows.is_empty() {
        return Err(IngestionError::EmptyData {
            path: path.to_path_buf(),
        });
    }
    to_canonical(&raw, mapping)
}

/// Rename, normalize and project a raw sheet onto the canonical schema.
pub fn to_canonical(raw: &RawTable, mapping: &ColumnMapping) -> IngestionResult<DataSet> {
    let col_idxs = project_columns(raw, mapping)?;
    let schema = mapping.canonical_schema();

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(raw.rows.len());
    for raw_row in &raw.rows {
        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let cell = raw_row.cells.get(col_idx).unwrap_or(&Data::Empty);
            let value = if field.data_type == DataType::Timestamp {
                Value::Timestamp(normalize_event_timestamp(raw_row.row, &field.name, cell)?)
            } else {
                cell_to_value(cell)
            };
            out_row.push(value);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

// Canonical field -> source column index, failing with every missing label at once.
fn project_columns(raw: &RawTable, mapping: &ColumnMapping) -> IngestionResult<Vec<usize>> {
    let mut col_idxs = Vec::with_capacity(mapping.len());
    let mut missing = Vec::new();
    for source in mapping.source_labels() {
        match raw.column_index(source) {
            Some(idx) => col_idxs.push(idx),
            None => missing.push(source),
        }
    }

    if !missing.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: format!(
                "sheet '{}': missing required column(s) {:?}. headers={:?}",
                raw.sheet, missing, raw.headers
            ),
        });
    }
    Ok(col_idxs)
}

fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => {
            if s.trim().is_empty() {
                Value::Null
            } else {
                Value::Utf8(s.clone())
            }
        }
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ts) => Value::Timestamp(ts),
            None => Value::Utf8(dt.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        Data::Error(e) => Value::Utf8(format!("{e:?}")),
    }
}
