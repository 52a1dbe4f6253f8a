//! Core type definitions for deltasync.

use deltasync_storage::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical timestamp.
///
/// Positive values stamp live rows with the time of their last write.
/// Negative values mark tombstones: the magnitude is the deletion time.
/// Zero is never stored; it stands for "never synchronized".
pub type Timestamp = i64;

/// The start of time, presented by clients that never synchronized.
pub const EPOCH: Timestamp = 0;

/// Name of the reserved column carrying the signed timestamp.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Semantic column type.
///
/// Used for the payload contract and for generated table definitions.
/// Values themselves are not coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Signed integer.
    Integer,
    /// Floating point number.
    Number,
    /// UTF-8 text.
    String,
    /// Boolean, stored as integer 0/1.
    Boolean,
    /// Raw bytes.
    Binary,
}

impl ColumnType {
    /// Returns the SQL type used in generated table definitions.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Number => "REAL",
            ColumnType::String => "TEXT",
            ColumnType::Binary => "BLOB",
        }
    }

    /// Returns the JSON-Schema fragment describing values of this type.
    pub fn json_schema(self) -> serde_json::Value {
        match self {
            ColumnType::Integer => serde_json::json!({ "type": "integer" }),
            ColumnType::Number => serde_json::json!({ "type": "number" }),
            ColumnType::String => serde_json::json!({ "type": "string" }),
            ColumnType::Boolean => serde_json::json!({ "type": "boolean" }),
            ColumnType::Binary => serde_json::json!({
                "type": "array",
                "items": { "type": "integer", "minimum": 0, "maximum": 255 }
            }),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Semantic type.
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    /// Creates a column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Creates an integer column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    /// Creates a number column.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Number)
    }

    /// Creates a string column.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }

    /// Creates a boolean column.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    /// Creates a binary column.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Binary)
    }
}

/// Partition values supplied by the caller context for one exchange.
///
/// Every configured extra column needs a value here. Rows written under
/// one set of values are invisible to exchanges carrying another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras {
    values: BTreeMap<String, Value>,
}

impl Extras {
    /// Creates an empty set of partition values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a partition value.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a partition value, replacing any previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Returns the value for a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Iterates over column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_serde_uses_type_key() {
        let column: Column = serde_json::from_str(r#"{"name":"id","type":"integer"}"#).unwrap();
        assert_eq!(column, Column::integer("id"));
        assert_eq!(
            serde_json::to_string(&Column::string("name")).unwrap(),
            r#"{"name":"name","type":"string"}"#
        );
    }

    #[test]
    fn column_type_mappings() {
        assert_eq!(ColumnType::Boolean.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Number.sql_type(), "REAL");
        assert_eq!(
            ColumnType::String.json_schema(),
            serde_json::json!({ "type": "string" })
        );
        assert_eq!(ColumnType::Binary.to_string(), "binary");
    }

    #[test]
    fn extras_builder() {
        let extras = Extras::new().with("user", 7).with("org", "acme");
        assert_eq!(extras.len(), 2);
        assert_eq!(extras.get("user"), Some(&Value::Integer(7)));
        assert_eq!(extras.columns().collect::<Vec<_>>(), vec!["org", "user"]);
        assert!(Extras::new().is_empty());
    }
}
