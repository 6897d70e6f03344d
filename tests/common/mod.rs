#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use eventlog_ingest::mapping::ColumnMapping;

pub const EVENT_LOG_DDL: &str = "CREATE TABLE EventLog (
    EventTimestamp TEXT NOT NULL,
    Category TEXT,
    EventType TEXT,
    Area TEXT,
    Node TEXT,
    Unit TEXT,
    Module TEXT,
    ModuleDescription TEXT,
    Parameter TEXT,
    State TEXT,
    Level TEXT,
    Description1 TEXT,
    Description2 TEXT
);";

/// How the timestamp cell of a fixture row is written.
pub enum Stamp<'a> {
    Text(&'a str),
    Excel(&'a str),
}

/// One source row: timestamp, category, and a free-text comment in an unmapped column.
pub struct EventRow<'a> {
    pub stamp: Stamp<'a>,
    pub category: &'a str,
    pub comment: &'a str,
}

impl<'a> EventRow<'a> {
    pub fn text(stamp: &'a str, category: &'a str) -> Self {
        Self {
            stamp: Stamp::Text(stamp),
            category,
            comment: "unmapped",
        }
    }
}

/// Creates an empty database with the EventLog table.
pub fn event_log_db(dir: &Path) -> PathBuf {
    let path = dir.join("events.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(EVENT_LOG_DDL).unwrap();
    path
}

pub fn count_rows(db: &Path) -> i64 {
    let conn = Connection::open(db).unwrap();
    conn.query_row("SELECT COUNT(*) FROM EventLog", [], |r| r.get(0))
        .unwrap()
}

/// `(EventTimestamp, Category)` of every stored row, in insertion order.
pub fn stored_rows(db: &Path) -> Vec<(String, Option<String>)> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT EventTimestamp, Category FROM EventLog ORDER BY rowid")
        .unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Writes a workbook with every mapped header, an extra `Comment` column, and `rows`.
pub fn write_event_xlsx(path: &Path, rows: &[EventRow<'_>]) {
    write_event_xlsx_with_headers(path, &all_headers(), rows);
}

/// Like [`write_event_xlsx`] but with an explicit header row.
///
/// Data cells are written under the `Timestamp [Local]`, `Category` and `Comment` headers when
/// present; every other header gets a filler value.
pub fn write_event_xlsx_with_headers(path: &Path, headers: &[String], rows: &[EventRow<'_>]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Events").unwrap();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, header) in headers.iter().enumerate() {
        ws.write_string(0, col as u16, header).unwrap();
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, header) in headers.iter().enumerate() {
            let col = col as u16;
            match header.as_str() {
                "Timestamp [Local]" => match row.stamp {
                    Stamp::Text(s) => {
                        ws.write_string(r, col, s).unwrap();
                    }
                    Stamp::Excel(s) => {
                        let dt = ExcelDateTime::parse_from_str(s).unwrap();
                        ws.write_datetime_with_format(r, col, &dt, &date_format).unwrap();
                    }
                },
                "Category" => {
                    ws.write_string(r, col, row.category).unwrap();
                }
                "Comment" => {
                    ws.write_string(r, col, row.comment).unwrap();
                }
                "Level" => {
                    ws.write_number(r, col, 2).unwrap();
                }
                other => {
                    ws.write_string(r, col, format!("{other} value")).unwrap();
                }
            }
        }
    }

    wb.save(path).unwrap();
}

pub fn all_headers() -> Vec<String> {
    let mut headers: Vec<String> = ColumnMapping::event_log()
        .source_labels()
        .map(str::to_string)
        .collect();
    headers.push("Comment".to_string());
    headers
}
