//! SQLite dialect

use crate::core::dialect::{flatten, Dialect};
use crate::core::error::Result;
use crate::core::statement::{NativeStatement, Sql};

/// SQL syntax of SQLite
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn start_transaction_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    fn connection_initializers(&self) -> Vec<String> {
        vec!["PRAGMA foreign_keys = ON".to_string()]
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, _) => String::new(),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (Some(limit), Some(offset)) => format!("LIMIT {} OFFSET {}", limit, offset),
        }
    }

    // SQLite string literals have no backslash escapes; only the quote is doubled.
    fn escape_str(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    fn prepare(&self, sql: &dyn Sql) -> Result<NativeStatement> {
        flatten(self, sql)
    }
}
