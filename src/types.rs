//! Canonical EventLog records held in memory between reading a workbook and persisting it.
//!
//! The [`Schema`] is derived from the [`crate::mapping::ColumnMapping`]: one [`Field`] per mapped
//! column, in mapping order. Cell values keep the loose typing they had in the sheet, except the
//! event timestamp, which is always a [`Value::Timestamp`] once a row has been normalized.

use chrono::NaiveDateTime;

use crate::error::{IngestionError, IngestionResult};

/// How a canonical column is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Passed through as read from the sheet.
    Any,
    /// Must hold a [`Value::Timestamp`].
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Canonical column order used for both rows and the INSERT column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// One cell of a canonical record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Blank cell (bound as SQL NULL).
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Utf8(String),
    /// Event time after the forward shift.
    Timestamp(NaiveDateTime),
}

/// The records extracted from one workbook, ready to append as a single batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub schema: Schema,
    /// One `Vec<Value>` per sheet row, aligned with `schema.fields`.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (`row`, `column`); `None` if either is out of range.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Every row has one value per field and every [`DataType::Timestamp`] field holds a
    /// [`Value::Timestamp`].
    pub fn check_shape(&self) -> IngestionResult<()> {
        let width = self.schema.fields.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(IngestionError::SchemaMismatch {
                    message: format!("record {i} has {} values, schema has {width} fields", row.len()),
                });
            }
            for (field, value) in self.schema.fields.iter().zip(row) {
                if field.data_type == DataType::Timestamp && !matches!(value, Value::Timestamp(_)) {
                    return Err(IngestionError::SchemaMismatch {
                        message: format!("record {i}: field '{}' is not a timestamp: {value:?}", field.name),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DataSet, DataType, Field, Schema, Value};
    use crate::error::IngestionErrorKind;

    fn stamped_schema() -> Schema {
        Schema::new(vec![
            Field::new("EventTimestamp", DataType::Timestamp),
            Field::new("Category", DataType::Any),
        ])
    }

    #[test]
    fn value_looks_up_by_column_name() {
        let schema = Schema::new(vec![
            Field::new("Category", DataType::Any),
            Field::new("Level", DataType::Any),
        ]);
        let ds = DataSet::new(
            schema,
            vec![vec![Value::Utf8("X".to_string()), Value::Int64(2)]],
        );

        assert_eq!(ds.value(0, "Level"), Some(&Value::Int64(2)));
        assert_eq!(ds.value(0, "Missing"), None);
        assert_eq!(ds.value(1, "Category"), None);
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["Category", "Level"]);
    }

    #[test]
    fn check_shape_accepts_timestamps_and_loose_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        let ds = DataSet::new(
            stamped_schema(),
            vec![
                vec![Value::Timestamp(ts), Value::Null],
                vec![Value::Timestamp(ts), Value::Float64(2.0)],
            ],
        );
        ds.check_shape().unwrap();
    }

    #[test]
    fn check_shape_rejects_untyped_timestamp_and_ragged_rows() {
        let text_stamp = DataSet::new(
            stamped_schema(),
            vec![vec![Value::Utf8("2024-01-01 10:00:00".to_string()), Value::Null]],
        );
        let err = text_stamp.check_shape().unwrap_err();
        assert_eq!(err.kind(), IngestionErrorKind::Schema);
        assert!(err.to_string().contains("EventTimestamp"));

        let ragged = DataSet::new(stamped_schema(), vec![vec![Value::Null]]);
        assert_eq!(ragged.check_shape().unwrap_err().kind(), IngestionErrorKind::Schema);
    }
}
