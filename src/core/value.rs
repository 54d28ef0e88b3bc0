//! Database value types
//!
//! This module defines the types that can be passed to statements and read back from rows.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::DatabaseError;

/// Canonical text form of timestamps, second precision
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date and time without time zone
    Timestamp(NaiveDateTime),
}

impl DatabaseValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v != 0),
            DatabaseValue::Long(v) => Some(*v != 0),
            DatabaseValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as an i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Long(v) => i32::try_from(*v).ok(),
            DatabaseValue::Float(v) => Some(*v as i32),
            DatabaseValue::Double(v) => Some(*v as i32),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as i64),
            DatabaseValue::Float(v) => Some(*v as i64),
            DatabaseValue::Double(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            DatabaseValue::Timestamp(v) => Some(v.and_utc().timestamp()),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Float(v) => Some(*v as f64),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::Long(v) => Some(*v as f64),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string (zero-copy for String values)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as a string (with conversion)
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::Bool(v) => v.to_string(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Long(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => format!("<{} bytes>", b.len()),
            DatabaseValue::Timestamp(v) => v.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Get the value as a timestamp
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            DatabaseValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Timestamp(_) => "timestamp",
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for DatabaseValue {
    fn from(v: NaiveDateTime) -> Self {
        DatabaseValue::Timestamp(v)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Target type tags understood by `Dialect::convert_primitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Integer,
    Float,
    String,
    Enum,
    DateTime,
}

impl PrimitiveType {
    /// The tag used in field type declarations
    pub fn to_str(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Float => "float",
            PrimitiveType::String => "string",
            PrimitiveType::Enum => "enum",
            PrimitiveType::DateTime => "datetime",
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for PrimitiveType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(PrimitiveType::Boolean),
            "integer" => Ok(PrimitiveType::Integer),
            "float" => Ok(PrimitiveType::Float),
            "string" => Ok(PrimitiveType::String),
            "enum" => Ok(PrimitiveType::Enum),
            "datetime" => Ok(PrimitiveType::DateTime),
            other => Err(DatabaseError::encoding(format!(
                "unknown field type: {}",
                other
            ))),
        }
    }
}

/// A row of database results, fields kept in their native column order
pub type DatabaseRow = IndexMap<String, DatabaseValue>;

/// Multiple rows returned from a query
pub type DatabaseResult = Vec<DatabaseRow>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_value_conversions() {
        let val = DatabaseValue::Int(42);
        assert_eq!(val.as_int(), Some(42));
        assert_eq!(val.as_long(), Some(42));
        assert_eq!(val.as_string(), "42");

        let val = DatabaseValue::String("123".to_string());
        assert_eq!(val.as_int(), Some(123));
        assert_eq!(val.as_long(), Some(123));

        let val = DatabaseValue::Bool(true);
        assert_eq!(val.as_bool(), Some(true));
        assert_eq!(val.as_int(), Some(1));
    }

    #[test]
    fn test_value_from_types() {
        let val: DatabaseValue = 42.into();
        assert_eq!(val, DatabaseValue::Int(42));

        let val: DatabaseValue = "hello".into();
        assert_eq!(val, DatabaseValue::String("hello".to_string()));

        let val: DatabaseValue = Some(42).into();
        assert_eq!(val, DatabaseValue::Int(42));

        let val: DatabaseValue = Option::<i32>::None.into();
        assert_eq!(val, DatabaseValue::Null);
    }

    #[test]
    fn test_timestamp_string_form() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_opt(8, 5, 0))
            .unwrap();
        let val = DatabaseValue::from(ts);
        assert_eq!(val.as_string(), "2024-02-29 08:05:00");
        assert_eq!(val.as_timestamp(), Some(ts));
        assert_eq!(val.type_name(), "timestamp");
    }

    #[test]
    fn test_primitive_type_tags() {
        assert_eq!("datetime".parse::<PrimitiveType>().ok(), Some(PrimitiveType::DateTime));
        assert_eq!("enum".parse::<PrimitiveType>().ok(), Some(PrimitiveType::Enum));
        assert!(matches!(
            "blob".parse::<PrimitiveType>(),
            Err(DatabaseError::Encoding(_))
        ));
    }

    #[test]
    fn test_row_keeps_column_order() {
        let mut row = DatabaseRow::new();
        row.insert("z".to_string(), DatabaseValue::Int(1));
        row.insert("a".to_string(), DatabaseValue::Int(2));
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
