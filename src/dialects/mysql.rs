//! MySQL / MariaDB dialect

use crate::core::dialect::{flatten, Dialect};
use crate::core::error::Result;
use crate::core::statement::{NativeStatement, Sql};

/// SQL syntax of the MySQL family
///
/// Connections are switched to UTF-8 and to manual commit on connect, so nothing is
/// persisted unless a transaction is committed.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn start_transaction_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    fn connection_initializers(&self) -> Vec<String> {
        vec!["SET NAMES utf8".to_string(), "SET AUTOCOMMIT=0".to_string()]
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, _) => String::new(),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!("LIMIT {},{}", offset, limit),
        }
    }

    /// Same escaping as `mysql_real_escape_string` on a UTF-8 connection
    fn escape_str(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 8);
        for ch in text.chars() {
            match ch {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                other => out.push(other),
            }
        }
        out
    }

    fn prepare(&self, sql: &dyn Sql) -> Result<NativeStatement> {
        flatten(self, sql)
    }
}
