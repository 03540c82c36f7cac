//! Schemaless record model.
//!
//! # Responsibility
//! - Define the flat record shape persisted by `Store` implementations.
//! - Provide predicate matching and field-merge helpers shared by backends.
//!
//! # Invariants
//! - `id` is assigned by the store and never changed by a merge.
//! - Field names are compared exactly; values are compared with JSON equality.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Reserved field name carrying the record id in predicates and wire shape.
pub const ID_FIELD: &str = "id";

/// Flat field set of a record, also used as an equality predicate.
pub type Fields = Map<String, Value>;

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Loose comparison used by `id` predicates: numbers and numeric strings
    /// both match.
    pub fn matches_value(self, value: &Value) -> bool {
        match value {
            Value::Number(number) => number.as_i64() == Some(self.0),
            Value::String(text) => text.parse::<RecordId>().ok() == Some(self),
            _ => false,
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::from(value.0)
    }
}

/// Error returned when a scalar cannot be read as a record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIdParseError(String);

impl Display for RecordIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid record id `{}`", self.0)
    }
}

impl Error for RecordIdParseError {}

impl FromStr for RecordId {
    type Err = RecordIdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| RecordIdParseError(value.to_string()))
    }
}

/// One stored record: immutable id plus flat fields.
///
/// Serialized flat, with `id` inline next to the other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Creates a record, dropping any `id` key carried inside `fields`.
    pub fn new(id: RecordId, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns whether every predicate entry equals the matching field.
    ///
    /// An empty predicate matches every record.
    pub fn matches(&self, predicate: &Fields) -> bool {
        predicate.iter().all(|(key, expected)| {
            if key == ID_FIELD {
                self.id.matches_value(expected)
            } else {
                self.fields.get(key) == Some(expected)
            }
        })
    }

    /// Merges `data` into this record; fields absent from `data` are kept.
    pub fn merge(&mut self, data: Fields) {
        for (key, value) in data {
            if key != ID_FIELD {
                self.fields.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Fields, Record, RecordId};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let record = Record::new(RecordId::new(1), fields(json!({"name": "Work"})));
        assert!(record.matches(&Fields::new()));
    }

    #[test]
    fn predicate_requires_every_field_to_match() {
        let record = Record::new(
            RecordId::new(3),
            fields(json!({"title": "a", "completed": false})),
        );
        assert!(record.matches(&fields(json!({"title": "a"}))));
        assert!(record.matches(&fields(json!({"title": "a", "completed": false}))));
        assert!(!record.matches(&fields(json!({"title": "a", "completed": true}))));
        assert!(!record.matches(&fields(json!({"missing": 1}))));
    }

    #[test]
    fn id_predicate_accepts_numeric_strings() {
        let record = Record::new(RecordId::new(42), Fields::new());
        assert!(record.matches(&fields(json!({"id": 42}))));
        assert!(record.matches(&fields(json!({"id": "42"}))));
        assert!(!record.matches(&fields(json!({"id": "forty-two"}))));
    }

    #[test]
    fn merge_keeps_untouched_fields_and_ignores_id() {
        let mut record = Record::new(
            RecordId::new(5),
            fields(json!({"title": "old", "completed": false})),
        );
        record.merge(fields(json!({"completed": true, "id": 99})));

        assert_eq!(record.id, RecordId::new(5));
        assert_eq!(record.get("title"), Some(&json!("old")));
        assert_eq!(record.get("completed"), Some(&json!(true)));
        assert!(record.get("id").is_none());
    }

    #[test]
    fn record_serializes_flat() {
        let record = Record::new(RecordId::new(7), fields(json!({"name": "Home"})));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": 7, "name": "Home"}));
    }

    #[test]
    fn record_id_parses_trimmed_scalars() {
        assert_eq!(" 12 ".parse::<RecordId>().unwrap(), RecordId::new(12));
        assert!("1.5".parse::<RecordId>().is_err());
    }
}
