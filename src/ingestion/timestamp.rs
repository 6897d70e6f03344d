//! EventTimestamp parsing and normalization.
//!
//! Source timestamps are timezone-naive local times. Every stored timestamp is the parsed
//! value shifted forward by [`EVENT_TIMESTAMP_OFFSET_MINUTES`].

use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{IngestionError, IngestionResult};

/// Fixed forward shift applied to every EventTimestamp before storage.
pub const EVENT_TIMESTAMP_OFFSET_MINUTES: i64 = 15;

// Excel's 1900 date system counts from 1899-12-30 (serial 60 is the phantom 1900-02-29).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a timestamp cell and apply the EventTimestamp offset.
///
/// `row` is the 1-based sheet row, used for error reporting only.
pub fn normalize_event_timestamp(row: usize, column: &str, cell: &Data) -> IngestionResult<NaiveDateTime> {
    let parsed = parse_timestamp_cell(row, column, cell)?;
    parsed
        .checked_add_signed(TimeDelta::minutes(EVENT_TIMESTAMP_OFFSET_MINUTES))
        .ok_or_else(|| timestamp_err(row, column, cell, "timestamp out of range after offset"))
}

/// Parse a timestamp cell without shifting it.
///
/// Accepts native Excel date cells, numeric serial dates, ISO date-time cells and text in the
/// common `YYYY-MM-DD HH:MM:SS` / `MM/DD/YYYY HH:MM[:SS] [AM|PM]` layouts.
pub fn parse_timestamp_cell(row: usize, column: &str, cell: &Data) -> IngestionResult<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .ok_or_else(|| timestamp_err(row, column, cell, "excel date out of range")),
        Data::Float(f) => excel_serial_to_datetime(*f)
            .ok_or_else(|| timestamp_err(row, column, cell, "excel serial date out of range")),
        Data::Int(i) => excel_serial_to_datetime(*i as f64)
            .ok_or_else(|| timestamp_err(row, column, cell, "excel serial date out of range")),
        Data::String(s) | Data::DateTimeIso(s) => parse_timestamp_str(s)
            .ok_or_else(|| timestamp_err(row, column, cell, "unrecognized date-time layout")),
        Data::Empty => Err(timestamp_err(row, column, cell, "missing timestamp")),
        _ => Err(timestamp_err(row, column, cell, "expected a date-time")),
    }
}

/// Parse a timestamp from text. Offsets, if present, are dropped and the wall-clock time kept.
pub fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Convert an Excel serial date (1900 date system) to a date-time, rounded to milliseconds.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let adjusted = if serial < 60.0 { serial + 1.0 } else { serial };
    let millis = (adjusted * MILLIS_PER_DAY).round() as i64;
    epoch.checked_add_signed(TimeDelta::milliseconds(millis))
}

fn timestamp_err(row: usize, column: &str, cell: &Data, message: &str) -> IngestionError {
    IngestionError::TimestampParse {
        row,
        column: column.to_string(),
        raw: cell.to_string(),
        message: message.to_string(),
    }
}
