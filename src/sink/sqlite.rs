use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::error::IngestionResult;
use crate::types::{DataSet, Value};

use super::{EventSink, DEFAULT_TABLE};

/// How long a writer waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Appends rows to an existing table in a SQLite database file.
///
/// A fresh connection is opened per [`EventSink::append`] call and the whole dataset is written
/// inside one transaction. The database file must already exist; it is opened read-write
/// without the create flag.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    database: PathBuf,
    table: String,
    busy_timeout: Duration,
}

impl SqliteSink {
    /// Sink targeting the `EventLog` table in `database`.
    pub fn new(database: impl AsRef<Path>) -> Self {
        Self {
            database: database.as_ref().to_path_buf(),
            table: DEFAULT_TABLE.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Target a different table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Override the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Path of the database file.
    pub fn database(&self) -> &Path {
        &self.database
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.database,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl EventSink for SqliteSink {
    fn table(&self) -> &str {
        &self.table
    }

    fn append(&self, data: &DataSet) -> IngestionResult<usize> {
        data.check_shape()?;
        let sql = insert_sql(&self.table, data.schema.field_names());

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &data.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        // Dropping an uncommitted transaction rolls it back, so any `?` above leaves the table
        // untouched.
        tx.commit()?;

        Ok(data.row_count())
    }
}

fn insert_sql<'a>(table: &str, columns: impl Iterator<Item = &'a str>) -> String {
    let columns: Vec<String> = columns.map(quote_ident).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int64(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float64(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Utf8(s) => ToSqlOutput::from(s.as_str()),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string())),
        })
    }
}
