//! Portable SQL statements
//!
//! A [`Statement`] is SQL text with `?` placeholders plus the ordered list of values for
//! those placeholders. The first parameter belongs to the first question mark, and so on.
//! A parameter can itself be a statement (a sub-query), which a dialect flattens into the
//! outer text when it prepares the statement for its engine.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::dialect::Dialect;
use super::value::DatabaseValue;

/// Anything that can be rendered into a portable [`Statement`]
///
/// `dialect` is the dialect of the engine the statement is headed to. Without one, the
/// implementation falls back to a generic rendering, good enough for log messages but not
/// necessarily executable.
pub trait Sql: fmt::Debug + Send + Sync {
    /// Render a fresh statement from the current state
    fn to_statement(&self, dialect: Option<&dyn Dialect>) -> Statement;

    /// Already executable text that must reach the engine untouched
    fn as_native(&self) -> Option<&NativeStatement> {
        None
    }
}

/// One positional parameter of a statement
#[derive(Debug, Clone)]
pub enum Param {
    /// A primitive value, inlined by the dialect as a literal
    Value(DatabaseValue),
    /// A sub-statement, inlined by the dialect in parentheses
    Nested(Arc<dyn Sql>),
}

impl Param {
    /// Wrap a sub-statement
    pub fn nested(sql: impl Sql + 'static) -> Self {
        Param::Nested(Arc::new(sql))
    }

    /// Get the primitive value, if this is not a sub-statement
    pub fn as_value(&self) -> Option<&DatabaseValue> {
        match self {
            Param::Value(v) => Some(v),
            Param::Nested(_) => None,
        }
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Param::Value(a), Param::Value(b)) => a == b,
            (Param::Nested(a), Param::Nested(b)) => a.to_statement(None) == b.to_statement(None),
            _ => false,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(v) => f.write_str(&v.as_string()),
            Param::Nested(sql) => write!(f, "({})", sql.to_statement(None).template()),
        }
    }
}

macro_rules! impl_param_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(v: $ty) -> Self {
                    Param::Value(DatabaseValue::from(v))
                }
            }
        )*
    };
}

impl_param_from_value!(bool, i32, i64, f32, f64, String, &str, Vec<u8>, NaiveDateTime);

impl From<DatabaseValue> for Param {
    fn from(v: DatabaseValue) -> Self {
        Param::Value(v)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        Param::Value(v.into())
    }
}

impl From<Statement> for Param {
    fn from(v: Statement) -> Self {
        Param::nested(v)
    }
}

/// Build an ordered parameter list from mixed values and sub-statements
///
/// ```
/// use abavee_db::{params, Param};
///
/// let list: Vec<Param> = params![7, "Ann", None::<i32>];
/// assert_eq!(list.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Param>::new()
    };
    ($($param:expr),+ $(,)?) => {
        ::std::vec![$($crate::Param::from($param)),+]
    };
}

/// SQL text with `?` placeholders and the parameters that fill them, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    template: String,
    params: Vec<Param>,
}

impl Statement {
    /// Create a statement from a template and its parameters
    pub fn new(template: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            template: template.into(),
            params,
        }
    }

    /// The SQL text with placeholders
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The parameters, in placeholder order
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of `?` placeholders in the template
    pub fn placeholder_count(&self) -> usize {
        self.template.matches('?').count()
    }

    /// Parameter list in `index=value` form, separated by `;`
    pub fn describe_params(&self) -> String {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}={}", i, p))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl Sql for Statement {
    fn to_statement(&self, _dialect: Option<&dyn Dialect>) -> Statement {
        self.clone()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Fully inlined SQL, directly executable by the engine it was prepared for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatement {
    sql: String,
}

impl NativeStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    pub fn into_string(self) -> String {
        self.sql
    }
}

impl Sql for NativeStatement {
    fn to_statement(&self, _dialect: Option<&dyn Dialect>) -> Statement {
        Statement::new(self.sql.clone(), Vec::new())
    }

    fn as_native(&self) -> Option<&NativeStatement> {
        Some(self)
    }
}

impl From<&NativeStatement> for Statement {
    fn from(native: &NativeStatement) -> Self {
        Statement::new(native.sql.clone(), Vec::new())
    }
}

impl From<NativeStatement> for Param {
    fn from(v: NativeStatement) -> Self {
        Param::nested(v)
    }
}

impl fmt::Display for NativeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
