//! Source-label to canonical-field mapping for EventLog exports.
//!
//! The mapping is loaded once at startup (either [`ColumnMapping::event_log`] or a JSON file)
//! and shared read-only for the life of the process.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Field, Schema};

/// Source column holding the local event time.
pub const TIMESTAMP_SOURCE_COLUMN: &str = "Timestamp [Local]";

/// Canonical name of the event time column.
pub const TIMESTAMP_FIELD: &str = "EventTimestamp";

const EVENT_LOG_COLUMNS: [(&str, &str); 13] = [
    (TIMESTAMP_SOURCE_COLUMN, TIMESTAMP_FIELD),
    ("Category", "Category"),
    ("Event Type [*]", "EventType"),
    ("Area", "Area"),
    ("Node", "Node"),
    ("Unit", "Unit"),
    ("Module", "Module"),
    ("Module Description", "ModuleDescription"),
    ("Parameter", "Parameter"),
    ("State", "State"),
    ("Level", "Level"),
    ("Desc1", "Description1"),
    ("Desc2", "Description2"),
];

/// One `source -> target` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnPair {
    /// Header label as it appears in the spreadsheet.
    pub source: String,
    /// Canonical field name in the EventLog table.
    pub target: String,
}

/// Ordered, immutable mapping from spreadsheet header labels to canonical field names.
///
/// Construction validates that sources and targets are unique and that the timestamp field is
/// mapped; there is no way to mutate a mapping once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pairs: Vec<ColumnPair>,
}

impl ColumnMapping {
    /// The built-in 13-column EventLog mapping.
    pub fn event_log() -> Self {
        Self {
            pairs: EVENT_LOG_COLUMNS
                .iter()
                .map(|(source, target)| ColumnPair {
                    source: (*source).to_string(),
                    target: (*target).to_string(),
                })
                .collect(),
        }
    }

    /// Build a mapping from explicit pairs.
    pub fn new(pairs: Vec<ColumnPair>) -> IngestionResult<Self> {
        if pairs.is_empty() {
            return Err(schema_err("column mapping is empty".to_string()));
        }

        let mut sources = HashSet::new();
        let mut targets = HashSet::new();
        for pair in &pairs {
            if !sources.insert(pair.source.as_str()) {
                return Err(schema_err(format!(
                    "duplicate source column '{}' in mapping",
                    pair.source
                )));
            }
            if !targets.insert(pair.target.as_str()) {
                return Err(schema_err(format!(
                    "duplicate target field '{}' in mapping",
                    pair.target
                )));
            }
        }
        if !targets.contains(TIMESTAMP_FIELD) {
            return Err(schema_err(format!(
                "mapping does not produce the '{TIMESTAMP_FIELD}' field"
            )));
        }

        Ok(Self { pairs })
    }

    /// Load a mapping from a JSON array of `{"source": .., "target": ..}` objects.
    ///
    /// Array order is the canonical column order.
    pub fn from_json_path(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let pairs: Vec<ColumnPair> = serde_json::from_str(&text).map_err(|e| {
            schema_err(format!("invalid mapping file {}: {e}", path.display()))
        })?;
        Self::new(pairs)
    }

    /// Pairs in canonical order.
    pub fn pairs(&self) -> &[ColumnPair] {
        &self.pairs
    }

    /// Number of mapped columns.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Always false for a validated mapping.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Spreadsheet header labels, in canonical order.
    pub fn source_labels(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.source.as_str())
    }

    /// Canonical field names, in canonical order.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.target.as_str())
    }

    /// Canonical name for a header label, if mapped.
    pub fn canonical_for(&self, source: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.source == source)
            .map(|p| p.target.as_str())
    }

    /// The canonical schema: one field per target, `EventTimestamp` typed as a timestamp.
    pub fn canonical_schema(&self) -> Schema {
        Schema::new(
            self.pairs
                .iter()
                .map(|p| {
                    let data_type = if p.target == TIMESTAMP_FIELD {
                        DataType::Timestamp
                    } else {
                        DataType::Any
                    };
                    Field::new(p.target.clone(), data_type)
                })
                .collect(),
        )
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::event_log()
    }
}

fn schema_err(message: String) -> IngestionError {
    IngestionError::SchemaMismatch { message }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{ColumnMapping, ColumnPair, TIMESTAMP_FIELD};
    use crate::error::IngestionErrorKind;
    use crate::types::DataType;

    fn pair(source: &str, target: &str) -> ColumnPair {
        ColumnPair {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn event_log_mapping_has_thirteen_unique_targets() {
        let mapping = ColumnMapping::event_log();
        assert_eq!(mapping.len(), 13);
        assert_eq!(mapping.canonical_names().next(), Some(TIMESTAMP_FIELD));
        assert_eq!(mapping.canonical_for("Event Type [*]"), Some("EventType"));
        assert_eq!(mapping.canonical_for("Desc2"), Some("Description2"));
        assert_eq!(mapping.canonical_for("Comment"), None);

        // Round-trips through the validating constructor unchanged.
        let rebuilt = ColumnMapping::new(mapping.pairs().to_vec()).unwrap();
        assert_eq!(rebuilt, mapping);
    }

    #[test]
    fn canonical_schema_types_only_the_timestamp() {
        let schema = ColumnMapping::event_log().canonical_schema();
        assert_eq!(schema.fields.len(), 13);
        assert_eq!(schema.fields[0].data_type, DataType::Timestamp);
        assert!(schema.fields[1..].iter().all(|f| f.data_type == DataType::Any));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let err = ColumnMapping::new(vec![
            pair("Timestamp [Local]", TIMESTAMP_FIELD),
            pair("Desc1", "Description"),
            pair("Desc2", "Description"),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), IngestionErrorKind::Schema);
        assert!(err.to_string().contains("duplicate target field 'Description'"));
    }

    #[test]
    fn rejects_mapping_without_timestamp() {
        let err = ColumnMapping::new(vec![pair("Category", "Category")]).unwrap_err();
        assert!(err.to_string().contains(TIMESTAMP_FIELD));
    }

    #[test]
    fn loads_ordered_pairs_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"source": "When", "target": "EventTimestamp"}},
                {{"source": "Kind", "target": "Category"}}
            ]"#
        )
        .unwrap();

        let mapping = ColumnMapping::from_json_path(file.path()).unwrap();
        assert_eq!(
            mapping.source_labels().collect::<Vec<_>>(),
            vec!["When", "Kind"]
        );
        assert_eq!(
            mapping.canonical_names().collect::<Vec<_>>(),
            vec!["EventTimestamp", "Category"]
        );
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = ColumnMapping::from_json_path(file.path()).unwrap_err();
        assert_eq!(err.kind(), IngestionErrorKind::Schema);
    }
}
