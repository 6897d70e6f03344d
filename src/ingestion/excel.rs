use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::{IngestionError, IngestionResult};

/// A worksheet as read from disk: trimmed header labels plus raw data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Worksheet the table was read from.
    pub sheet: String,
    /// Header labels, trimmed.
    pub headers: Vec<String>,
    /// Data rows below the header, entirely blank rows removed.
    pub rows: Vec<RawRow>,
}

/// One non-blank data row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based sheet row number.
    pub row: usize,
    /// Cells in header order (may be shorter than the header).
    pub cells: Vec<Data>,
}

impl RawTable {
    /// Column index of a header label.
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == label)
    }
}

/// Read one worksheet of an Excel workbook (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
///
/// Behavior:
/// - Picks `sheet_name` if provided; otherwise uses the first sheet in the workbook
/// - Detects the first non-empty row as the header row
/// - Returns remaining non-blank rows unconverted
pub fn read_excel_sheet(path: impl AsRef<Path>, sheet_name: Option<&str>) -> IngestionResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestionError::SchemaMismatch {
                message: "workbook has no sheets".to_string(),
            })?,
    };

    let range = workbook.worksheet_range(&sheet)?;
    read_sheet_range(&sheet, &range)
}

fn read_sheet_range(sheet: &str, range: &Range<Data>) -> IngestionResult<RawTable> {
    // A blank sheet has no header and no data rows; the caller reports it as empty.
    let Some((header_row_idx, headers)) = find_header_row(range) else {
        return Ok(RawTable {
            sheet: sheet.to_string(),
            headers: Vec::new(),
            rows: Vec::new(),
        });
    };

    // Ranges start at the first used cell, not necessarily A1.
    let row_offset = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut rows = Vec::new();
    for (idx0, row) in range.rows().enumerate() {
        if idx0 <= header_row_idx || is_blank(row) {
            continue;
        }
        rows.push(RawRow {
            row: row_offset + idx0 + 1,
            cells: row.to_vec(),
        });
    }

    Ok(RawTable {
        sheet: sheet.to_string(),
        headers,
        rows,
    })
}

fn find_header_row(range: &Range<Data>) -> Option<(usize, Vec<String>)> {
    range
        .rows()
        .enumerate()
        .find(|(_, row)| !is_blank(row))
        .map(|(idx0, row)| {
            let headers = row
                .iter()
                .map(|c| cell_to_header_string(c).trim().to_string())
                .collect();
            (idx0, headers)
        })
}

fn is_blank(row: &[Data]) -> bool {
    row.iter().all(|c| match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}
