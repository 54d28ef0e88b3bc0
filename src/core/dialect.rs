//! Per-engine SQL syntax and value conversion
//!
//! A [`Dialect`] turns portable [`Statement`]s into [`NativeStatement`]s for one engine
//! family. The engines we target do not bind parameters themselves, so preparation inlines
//! every parameter as escaped literal text and flattens sub-statements in parentheses.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{DatabaseError, Result};
use super::statement::{NativeStatement, Param, Sql, Statement};
use super::value::{DatabaseValue, PrimitiveType, TIMESTAMP_FORMAT};

/// SQL syntax and value conversion policy of one engine family
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Statement that begins a transaction
    fn start_transaction_sql(&self) -> &'static str;

    /// Statement that commits a transaction
    fn commit_sql(&self) -> &'static str;

    /// Statement that rolls back a transaction
    fn rollback_sql(&self) -> &'static str;

    /// Statements run once, right after connecting
    fn connection_initializers(&self) -> Vec<String>;

    /// LIMIT/OFFSET clause, empty when `limit` is absent
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String;

    /// Escape text so it can be placed between single quotes
    fn escape_str(&self, text: &str) -> String;

    /// Flatten `sql` into directly executable text
    fn prepare(&self, sql: &dyn Sql) -> Result<NativeStatement>;

    /// SQL literal for a primitive parameter value
    fn encode_primitive(&self, value: &DatabaseValue) -> Result<String> {
        match value {
            DatabaseValue::Null => Ok("null".to_string()),
            DatabaseValue::Bool(v) => Ok(if *v { "1" } else { "0" }.to_string()),
            DatabaseValue::Timestamp(v) => Ok(format!("'{}'", v.format(TIMESTAMP_FORMAT))),
            DatabaseValue::String(s) => Ok(format!("'{}'", self.escape_str(s))),
            DatabaseValue::Int(v) => Ok(v.to_string()),
            DatabaseValue::Long(v) => Ok(v.to_string()),
            DatabaseValue::Float(v) if v.is_finite() => Ok(v.to_string()),
            DatabaseValue::Double(v) if v.is_finite() => Ok(v.to_string()),
            other => Err(DatabaseError::encoding(format!(
                "unsupported parameter type: {}",
                describe_unsupported(other)
            ))),
        }
    }

    /// Convert a value read from the engine into the requested domain type
    ///
    /// `NULL` passes through untouched whatever the requested type.
    fn convert_primitive(&self, ty: PrimitiveType, value: &DatabaseValue) -> Result<DatabaseValue> {
        if value.is_null() {
            return Ok(DatabaseValue::Null);
        }
        match ty {
            PrimitiveType::Boolean => convert_boolean(value),
            PrimitiveType::Integer => convert_integer(value),
            PrimitiveType::Float => convert_float(value),
            PrimitiveType::DateTime => convert_datetime(value),
            PrimitiveType::String | PrimitiveType::Enum => Ok(DatabaseValue::String(match value {
                DatabaseValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                other => other.as_string(),
            })),
        }
    }
}

fn describe_unsupported(value: &DatabaseValue) -> String {
    match value {
        DatabaseValue::Float(v) => format!("non-finite float {}", v),
        DatabaseValue::Double(v) => format!("non-finite double {}", v),
        other => other.type_name().to_string(),
    }
}

/// Inline the parameters of `sql` into its template, recursively
///
/// Shared by every dialect's `prepare`. The template is scanned left to right; each `?`
/// consumes the next parameter. Nested statements are prepared with the same dialect and
/// wrapped in parentheses, primitives go through `encode_primitive`. The placeholder and
/// parameter counts must match exactly. Native statements are copied verbatim, so a
/// literal `?` inside them is never taken for a placeholder.
pub fn flatten(dialect: &dyn Dialect, sql: &dyn Sql) -> Result<NativeStatement> {
    if let Some(native) = sql.as_native() {
        return Ok(native.clone());
    }
    let statement = sql.to_statement(Some(dialect));
    let mut params = statement.params().iter();
    let mut out = String::with_capacity(statement.template().len());

    for ch in statement.template().chars() {
        if ch != '?' {
            out.push(ch);
            continue;
        }
        match params.next() {
            Some(Param::Nested(inner)) => {
                let inner = flatten(dialect, inner.as_ref())?;
                out.push('(');
                out.push_str(inner.as_str());
                out.push(')');
            }
            Some(Param::Value(value)) => out.push_str(&dialect.encode_primitive(value)?),
            None => return Err(count_mismatch(&statement)),
        }
    }

    if params.next().is_some() {
        return Err(count_mismatch(&statement));
    }
    Ok(NativeStatement::new(out))
}

fn count_mismatch(statement: &Statement) -> DatabaseError {
    DatabaseError::statement(
        format!(
            "placeholder count mismatch: {} placeholders, {} parameters",
            statement.placeholder_count(),
            statement.params().len()
        ),
        Some(statement.clone()),
    )
}

fn convert_boolean(value: &DatabaseValue) -> Result<DatabaseValue> {
    let parsed = match value {
        DatabaseValue::Bool(v) => Some(*v),
        DatabaseValue::Int(1) | DatabaseValue::Long(1) => Some(true),
        DatabaseValue::Int(0) | DatabaseValue::Long(0) => Some(false),
        DatabaseValue::String(s) if s == "1" => Some(true),
        DatabaseValue::String(s) if s == "0" => Some(false),
        DatabaseValue::Bytes(b) if b.as_slice() == b"1" => Some(true),
        DatabaseValue::Bytes(b) if b.as_slice() == b"0" => Some(false),
        _ => None,
    };
    parsed.map(DatabaseValue::Bool).ok_or_else(|| {
        DatabaseError::encoding(format!(
            "cannot convert boolean value [{}]",
            value.as_string()
        ))
    })
}

fn text_of(value: &DatabaseValue) -> Option<String> {
    match value {
        DatabaseValue::String(s) => Some(s.trim().to_string()),
        DatabaseValue::Bytes(b) => Some(String::from_utf8_lossy(b).trim().to_string()),
        _ => None,
    }
}

fn convert_integer(value: &DatabaseValue) -> Result<DatabaseValue> {
    let parsed = match value {
        DatabaseValue::Bool(v) => Some(*v as i64),
        DatabaseValue::Int(v) => Some(*v as i64),
        DatabaseValue::Long(v) => Some(*v),
        DatabaseValue::Float(v) if v.is_finite() => Some(*v as i64),
        DatabaseValue::Double(v) if v.is_finite() => Some(*v as i64),
        other => text_of(other).and_then(|s| s.parse().ok()),
    };
    parsed.map(DatabaseValue::Long).ok_or_else(|| {
        DatabaseError::encoding(format!(
            "cannot convert integer value [{}]",
            value.as_string()
        ))
    })
}

fn convert_float(value: &DatabaseValue) -> Result<DatabaseValue> {
    let parsed = match value {
        DatabaseValue::Int(v) => Some(*v as f64),
        DatabaseValue::Long(v) => Some(*v as f64),
        DatabaseValue::Float(v) => Some(*v as f64),
        DatabaseValue::Double(v) => Some(*v),
        other => text_of(other).and_then(|s| s.parse().ok()),
    };
    parsed.map(DatabaseValue::Double).ok_or_else(|| {
        DatabaseError::encoding(format!("cannot convert float value [{}]", value.as_string()))
    })
}

static DATETIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ *(\d+)[-.](\d+)[-.](\d+)(?: *T? *(\d+):(\d+)(?::(\d+))?)? *$")
        .expect("datetime pattern is valid")
});

/// Parse `YYYY-MM-DD`, optionally followed by `HH:MM` or `HH:MM:SS`
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let caps = DATETIME_PATTERN.captures(text)?;
    let num = |i: usize| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let year = caps.get(1)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

fn convert_datetime(value: &DatabaseValue) -> Result<DatabaseValue> {
    if let DatabaseValue::Timestamp(v) = value {
        return Ok(DatabaseValue::Timestamp(*v));
    }
    text_of(value)
        .as_deref()
        .and_then(parse_timestamp)
        .map(DatabaseValue::Timestamp)
        .ok_or_else(|| {
            DatabaseError::encoding(format!("unable to parse date: {}", value.as_string()))
        })
}
