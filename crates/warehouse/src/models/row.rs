//! Storage row shape shared by every entity

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fmt;

use super::Entity;

/// A scalar column value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Map an untyped JSON value onto a column value
    ///
    /// Nested arrays and objects are stored as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map_or(FieldValue::Null, FieldValue::Real),
            },
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::from_json(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Primary key of a row: one part for `id` tables, several for composite keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub Vec<String>);

impl RecordKey {
    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self::single(s)
    }
}

/// A record mapped to storage columns
///
/// `values` follows the column order of the owning entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: RecordKey,
    pub values: Vec<FieldValue>,
}

impl Row {
    pub fn new(key: RecordKey, values: Vec<FieldValue>) -> Self {
        Self { key, values }
    }

    /// Value of a named column
    pub fn get(&self, entity: Entity, column: &str) -> Option<&FieldValue> {
        entity.column_index(column).and_then(|i| self.values.get(i))
    }
}

/// A typed source record
///
/// Implementors deserialize from the source JSON shape and map themselves
/// onto the column order of [`Record::ENTITY`].
pub trait Record: DeserializeOwned {
    const ENTITY: Entity;

    fn key(&self) -> RecordKey;

    fn into_row(self) -> Row;
}
