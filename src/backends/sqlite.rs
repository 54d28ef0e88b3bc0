//! SQLite engine
//!
//! Embedded engine on top of `rusqlite`. Query results are read completely into a
//! buffered cursor, so the statement handle is finalized before `query` returns.

use rusqlite::{Connection, Row};
use tracing::{debug, error, info, warn};

use crate::core::connection::ConnectionParameters;
use crate::core::dialect::Dialect;
use crate::core::engine::{
    ensure_protocol, initialize, BufferedCursor, CursorTable, Engine, ResultHandle,
    TransactionDepth,
};
use crate::core::error::{DatabaseError, Result};
use crate::core::statement::{NativeStatement, Statement};
use crate::core::value::{DatabaseRow, DatabaseValue};

const SUPPORTED_PROTOCOLS: &[&str] = &["sqlite", "sqlite3"];

/// SQLite engine
pub struct SqliteEngine {
    connection: Option<Connection>,
    dialect: Box<dyn Dialect>,
    depth: TransactionDepth,
    cursors: CursorTable,
}

impl SqliteEngine {
    /// Open the database file named by `params.database()`; an empty name opens an
    /// in-memory database
    pub fn connect(params: &ConnectionParameters, dialect: Box<dyn Dialect>) -> Result<Self> {
        ensure_protocol(params, SUPPORTED_PROTOCOLS)?;

        let path = match params.database() {
            "" => ":memory:",
            path => path,
        };
        let connection = Connection::open(path).map_err(|e| {
            DatabaseError::connection(format!("cannot open SQLite database {}: {}", path, e))
        })?;

        let mut engine = Self {
            connection: Some(connection),
            dialect,
            depth: TransactionDepth::new(),
            cursors: CursorTable::new(),
        };
        initialize(&mut engine)?;

        info!(database = path, "sqlite engine connected");
        Ok(engine)
    }

    /// Convenience: in-memory database with the SQLite dialect
    pub fn open_in_memory() -> Result<Self> {
        let params = ConnectionParameters::builder().protocol("sqlite").build();
        Self::connect(&params, Box::new(crate::dialects::SqliteDialect::new()))
    }

    fn connection(&self, statement: Option<&NativeStatement>) -> Result<&Connection> {
        self.connection.as_ref().ok_or_else(|| {
            DatabaseError::statement("connection is closed", statement.map(Statement::from))
        })
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let mut db_row = DatabaseRow::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => DatabaseValue::Null,
                rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    DatabaseValue::String(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }
}

fn statement_error(e: rusqlite::Error, statement: &NativeStatement) -> DatabaseError {
    DatabaseError::statement(e.to_string(), Some(Statement::from(statement)))
}

impl Engine for SqliteEngine {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    fn escape(&self, text: &str) -> String {
        self.dialect.escape_str(text)
    }

    fn execute_primitive(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "sqlite primitive");
        self.connection(None)?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::statement(e.to_string(), Some(Statement::new(sql, vec![]))))
    }

    fn execute(&mut self, statement: &NativeStatement) -> Result<u64> {
        debug!(sql = statement.as_str(), "sqlite execute");
        let affected = self
            .connection(Some(statement))?
            .execute(statement.as_str(), [])
            .map_err(|e| statement_error(e, statement))?;
        Ok(affected as u64)
    }

    fn insert(&mut self, statement: &NativeStatement) -> Result<i64> {
        debug!(sql = statement.as_str(), "sqlite insert");
        let conn = self.connection(Some(statement))?;
        conn.execute(statement.as_str(), [])
            .map_err(|e| statement_error(e, statement))?;
        Ok(conn.last_insert_rowid())
    }

    fn query(&mut self, statement: &NativeStatement) -> Result<ResultHandle> {
        debug!(sql = statement.as_str(), "sqlite query");
        let rows = {
            let conn = self.connection(Some(statement))?;
            let mut stmt = conn
                .prepare(statement.as_str())
                .map_err(|e| statement_error(e, statement))?;
            let rows = stmt
                .query_map([], Self::row_to_database_row)
                .map_err(|e| statement_error(e, statement))?;

            let mut results = Vec::new();
            for row_result in rows {
                results.push(row_result.map_err(|e| statement_error(e, statement))?);
            }
            results
        };
        Ok(self.cursors.register(Box::new(BufferedCursor::new(rows))))
    }

    fn close(&mut self) -> Result<()> {
        self.cursors.release_all();
        if let Some(conn) = self.connection.take() {
            conn.close()
                .map_err(|(_, e)| DatabaseError::connection(format!("close failed: {}", e)))?;
            info!("sqlite engine closed");
        }
        Ok(())
    }

    fn transaction_depth(&self) -> &TransactionDepth {
        &self.depth
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        &mut self.depth
    }

    fn cursors(&mut self) -> &mut CursorTable {
        &mut self.cursors
    }
}

impl Drop for SqliteEngine {
    fn drop(&mut self) {
        if self.depth.is_open() {
            warn!("sqlite engine dropped with an open transaction, rolling back");
            if let Some(conn) = self.connection.as_ref() {
                if let Err(e) = conn.execute_batch(self.dialect.rollback_sql()) {
                    error!(error = %e, "rollback on drop failed");
                }
            }
        }
        // Connection will be closed automatically when dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::Database;
    use crate::core::query_builder::{InsertBuilder, SelectBuilder};
    use crate::params;

    fn create_test_table(db: &mut Database) -> Result<()> {
        db.execute(&NativeStatement::new(
            "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)",
        ))?;
        Ok(())
    }

    #[test]
    fn test_sqlite_connect() {
        let params = ConnectionParameters::builder().protocol("sqlite3").build();
        let mut engine =
            SqliteEngine::connect(&params, Box::new(crate::dialects::SqliteDialect::new()))
                .unwrap();
        assert!(engine.close().is_ok());
        assert!(engine.execute(&NativeStatement::new("SELECT 1")).is_err());
    }

    #[test]
    fn test_sqlite_rejects_other_protocols() {
        let params = ConnectionParameters::builder().protocol("mysql").build();
        let result = SqliteEngine::connect(&params, Box::new(crate::dialects::SqliteDialect::new()));
        assert!(matches!(result, Err(DatabaseError::UnsupportedProtocol(_))));
    }

    #[test]
    fn test_sqlite_insert_and_query() -> Result<()> {
        let mut db = Database::new(SqliteEngine::open_in_memory()?);
        create_test_table(&mut db)?;

        let id = db.insert(&InsertBuilder::new("test").set("name", "Alice"))?;
        assert_eq!(id, 1);
        let id = db.insert(&InsertBuilder::new("test").set("name", "Bob"))?;
        assert_eq!(id, 2);

        let results = db.query_assoc_table(&SelectBuilder::new().from("test").order_by_asc("id"))?;
        assert_eq!(results.len(), 2);

        let name1 = results[0]
            .get("name")
            .ok_or_else(|| DatabaseError::ColumnNotFound("name".to_string()))?
            .as_string();
        assert_eq!(name1, "Alice");

        let name2 = results[1]
            .get("name")
            .ok_or_else(|| DatabaseError::ColumnNotFound("name".to_string()))?
            .as_string();
        assert_eq!(name2, "Bob");

        Ok(())
    }

    #[test]
    fn test_sqlite_transaction() -> Result<()> {
        let mut db = Database::new(SqliteEngine::open_in_memory()?);
        create_test_table(&mut db)?;
        let count = SelectBuilder::new().count().from("test");

        // Test commit
        db.start_transaction()?;
        assert!(db.is_transaction_open());
        db.insert(&InsertBuilder::new("test").set("name", "Alice"))?;
        db.commit()?;
        assert!(!db.is_transaction_open());
        assert_eq!(db.query_cell(&count, None, false)?, Some(DatabaseValue::Long(1)));

        // Test rollback
        db.start_transaction()?;
        db.insert(&InsertBuilder::new("test").set("name", "Bob"))?;
        db.rollback()?;
        assert!(!db.is_transaction_open());
        assert_eq!(db.query_cell(&count, None, false)?, Some(DatabaseValue::Long(1)));

        Ok(())
    }

    #[test]
    fn test_sqlite_statement_error_carries_sql() -> Result<()> {
        let mut db = Database::new(SqliteEngine::open_in_memory()?);
        let err = db
            .query_row(
                &SelectBuilder::new().from("missing").and_where("id=?", params![1]),
                false,
            )
            .unwrap_err();

        assert!(err.base_message().contains("no such table"));
        assert_eq!(
            err.statement_ref().map(|s| s.template()),
            Some("SELECT * FROM missing WHERE (id=1)")
        );
        Ok(())
    }
}
