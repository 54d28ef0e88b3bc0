//! Database façade
//!
//! [`Database`] is the entry point application code uses. It wraps one [`Engine`] and
//! funnels every call through the engine's dialect: a portable statement is prepared
//! into native SQL, then handed to the engine. On top of the raw query primitive it
//! offers the common result shapes (single row, single cell, column, mapping, table).

use indexmap::IndexMap;
use tracing::{error, info};

use super::config::Config;
use super::connection::ConnectionParameters;
use super::database_types::DatabaseType;
use super::dialect::Dialect;
use super::engine::Engine;
use super::error::{DatabaseError, Result};
use super::result_set::ResultSet;
use super::statement::{NativeStatement, Sql};
use super::transaction::TransactionGuard;
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use crate::backends::mock::MockEngine;

/// High-level access to one database connection
pub struct Database {
    engine: Box<dyn Engine>,
}

impl Database {
    /// Wrap an already connected engine
    pub fn new(engine: impl Engine + 'static) -> Self {
        Self::from_engine(Box::new(engine))
    }

    pub fn from_engine(engine: Box<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Open a connection, picking engine and dialect from the protocol
    pub fn connect(params: &ConnectionParameters) -> Result<Self> {
        let db_type = params.database_type()?;
        let dialect = db_type.dialect();

        let engine: Box<dyn Engine> = match db_type {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Box::new(crate::backends::SqliteEngine::connect(params, dialect)?),
            #[cfg(not(feature = "sqlite"))]
            DatabaseType::Sqlite => {
                return Err(DatabaseError::connection(
                    "SQLite support is not compiled in (enable the `sqlite` feature)",
                ))
            }
            #[cfg(feature = "mysql")]
            DatabaseType::Mysql => Box::new(crate::backends::MysqlEngine::connect(params, dialect)?),
            #[cfg(not(feature = "mysql"))]
            DatabaseType::Mysql => {
                return Err(DatabaseError::connection(
                    "MySQL support is not compiled in (enable the `mysql` feature)",
                ))
            }
            DatabaseType::Mock => Box::new(MockEngine::connect(params, dialect)?),
        };

        info!(
            protocol = params.protocol(),
            host = params.host(),
            database = params.database(),
            "database connected"
        );
        Ok(Self { engine })
    }

    /// Open the connection described under `key` in `config`
    pub fn from_config(config: &Config, key: &str) -> Result<Self> {
        let params = ConnectionParameters::from_config(config, key)?;
        Self::connect(&params)
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.engine.dialect()
    }

    /// Translate a statement into the engine's native SQL without running it
    pub fn prepare(&self, sql: &dyn Sql) -> Result<NativeStatement> {
        self.engine.dialect().prepare(sql)
    }

    /// Run a statement, returning the number of affected rows
    pub fn execute(&mut self, sql: &dyn Sql) -> Result<u64> {
        let native = self.prepare(sql)?;
        self.engine.execute(&native)
    }

    /// Run an INSERT, returning the generated id
    pub fn insert(&mut self, sql: &dyn Sql) -> Result<i64> {
        let native = self.prepare(sql)?;
        self.engine.insert(&native)
    }

    /// Run a query and iterate its rows
    pub fn query(&mut self, sql: &dyn Sql, auto_close: bool) -> Result<ResultSet> {
        let native = self.prepare(sql)?;
        let handle = self.engine.query(&native)?;
        self.engine.result_set_for(handle, auto_close)
    }

    /// First row of the result
    ///
    /// An empty result is an error unless `null_on_empty` is set, in which case `None` is
    /// returned.
    pub fn query_row(&mut self, sql: &dyn Sql, null_on_empty: bool) -> Result<Option<DatabaseRow>> {
        let native = self.prepare(sql)?;
        let handle = self.engine.query(&native)?;
        match self.engine.fetch_first_row_only(handle)? {
            Some(row) => Ok(Some(row)),
            None if null_on_empty => Ok(None),
            None => Err(DatabaseError::empty_result(
                sql.to_statement(Some(self.engine.dialect())),
            )),
        }
    }

    /// One field of the first row: the named one, or the first column
    pub fn query_cell(
        &mut self,
        sql: &dyn Sql,
        field: Option<&str>,
        null_on_empty: bool,
    ) -> Result<Option<DatabaseValue>> {
        match self.query_row(sql, null_on_empty)? {
            Some(mut row) => Self::get_row_field(&mut row, field).map(Some),
            None => Ok(None),
        }
    }

    /// One field of every row, in row order
    pub fn query_column(&mut self, sql: &dyn Sql, field: Option<&str>) -> Result<Vec<DatabaseValue>> {
        let mut column = Vec::new();
        for row in self.query(sql, true)? {
            let mut row = row?;
            column.push(Self::get_row_field(&mut row, field)?);
        }
        Ok(column)
    }

    /// Key → value pairs from every row
    ///
    /// Keys are stringified. When two rows share a key the later row wins; the key keeps
    /// the position where it first appeared. With both fields unnamed the first column is
    /// the key and the second the value.
    pub fn query_mapping(
        &mut self,
        sql: &dyn Sql,
        key_field: Option<&str>,
        value_field: Option<&str>,
    ) -> Result<IndexMap<String, DatabaseValue>> {
        let mut mapping = IndexMap::new();
        for row in self.query(sql, true)? {
            let mut row = row?;
            let key = Self::get_row_field(&mut row, key_field)?;
            let value = Self::get_row_field(&mut row, value_field)?;
            mapping.insert(key.as_string(), value);
        }
        Ok(mapping)
    }

    /// Every row, fully materialized
    pub fn query_assoc_table(&mut self, sql: &dyn Sql) -> Result<DatabaseResult> {
        self.query(sql, true)?.collect()
    }

    /// Read a field from a row
    ///
    /// With a name the field is cloned and the row is left untouched. Without one, the
    /// first remaining field is *removed* from the row and returned, so consecutive unnamed
    /// lookups walk the columns left to right. Beware: reading the same row twice this way
    /// yields different fields.
    pub fn get_row_field(row: &mut DatabaseRow, field: Option<&str>) -> Result<DatabaseValue> {
        match field {
            Some(name) => row
                .get(name)
                .cloned()
                .ok_or_else(|| DatabaseError::ColumnNotFound(name.to_string())),
            None => row
                .shift_remove_index(0)
                .map(|(_, value)| value)
                .ok_or_else(|| DatabaseError::ColumnNotFound("<first field>".to_string())),
        }
    }

    pub fn start_transaction(&mut self) -> Result<()> {
        self.engine.start_transaction()
    }

    /// Commit; inside nested transactions only the outermost commit reaches the database
    pub fn commit(&mut self) -> Result<()> {
        self.engine.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.engine.rollback()
    }

    pub fn is_transaction_open(&self) -> bool {
        self.engine.is_transaction_open()
    }

    /// Start a transaction that rolls back unless committed
    pub fn begin(&mut self) -> Result<TransactionGuard<'_>> {
        TransactionGuard::begin(self)
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T>,
    {
        self.start_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    error!(error = %rollback_err, "rollback after failed transaction failed");
                }
                Err(e)
            }
        }
    }

    /// Escape text for a raw SQL literal. Prefer statement parameters.
    pub fn escape(&self, text: &str) -> String {
        self.engine.escape(text)
    }

    pub fn close(&mut self) -> Result<()> {
        self.engine.close()?;
        info!("database closed");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.engine.dialect())
            .field("transaction_open", &self.engine.is_transaction_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{mock_row, MockHandle, MockResponse};
    use crate::core::query_builder::{SelectBuilder, UpdateBuilder};
    use crate::core::statement::Statement;
    use crate::params;

    fn mock_db() -> (Database, MockHandle) {
        let engine = MockEngine::new();
        let handle = engine.handle();
        (Database::new(engine), handle)
    }

    fn users() -> SelectBuilder {
        SelectBuilder::new().fields("id, name").from("users")
    }

    #[test]
    fn test_execute_prepares_statement() {
        let (mut db, handle) = mock_db();
        handle.expect(
            "UPDATE users SET name='Ann' WHERE (id=7)",
            MockResponse::Affected(1),
        );

        let update = UpdateBuilder::new("users")
            .set("name", "Ann")
            .and_where("id=?", params![7]);
        assert_eq!(db.execute(&update).unwrap(), 1);
    }

    #[test]
    fn test_execute_native_statement_verbatim() {
        let (mut db, handle) = mock_db();
        handle.expect("UPDATE faq SET q='why?'", MockResponse::Affected(1));

        let affected = db
            .execute(&NativeStatement::new("UPDATE faq SET q='why?'"))
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(handle.executed(), vec!["UPDATE faq SET q='why?'"]);
    }

    #[test]
    fn test_query_row_empty() {
        let (mut db, handle) = mock_db();
        handle
            .expect("SELECT id, name FROM users", MockResponse::Rows(vec![]))
            .expect("SELECT id, name FROM users", MockResponse::Rows(vec![]));

        let err = db.query_row(&users(), false).unwrap_err();
        assert!(matches!(err, DatabaseError::EmptyResult { .. }));
        assert_eq!(
            err.statement_ref().map(|s| s.template()),
            Some("SELECT id, name FROM users")
        );

        assert_eq!(db.query_row(&users(), true).unwrap(), None);
        assert_eq!(handle.released_cursors(), 2);
    }

    #[test]
    fn test_query_cell_named_and_unnamed() {
        let (mut db, handle) = mock_db();
        let mut row = mock_row([("id", 1)]);
        row.insert("name".to_string(), DatabaseValue::from("Ann"));
        let rows = vec![row];
        handle
            .expect("SELECT id, name FROM users", MockResponse::Rows(rows.clone()))
            .expect("SELECT id, name FROM users", MockResponse::Rows(rows))
            .expect("SELECT id, name FROM users", MockResponse::Rows(vec![]));

        assert_eq!(
            db.query_cell(&users(), Some("name"), false).unwrap(),
            Some(DatabaseValue::from("Ann"))
        );
        assert_eq!(
            db.query_cell(&users(), None, false).unwrap(),
            Some(DatabaseValue::Int(1))
        );
        assert_eq!(db.query_cell(&users(), None, true).unwrap(), None);
    }

    #[test]
    fn test_query_column() {
        let (mut db, handle) = mock_db();
        handle.expect(
            "SELECT name FROM users",
            MockResponse::Rows(vec![mock_row([("name", "a")]), mock_row([("name", "b")])]),
        );

        let names = db
            .query_column(&SelectBuilder::new().fields("name").from("users"), None)
            .unwrap();
        assert_eq!(names, vec![DatabaseValue::from("a"), DatabaseValue::from("b")]);
        assert_eq!(handle.released_cursors(), 1);
    }

    #[test]
    fn test_query_mapping_last_write_wins() {
        let (mut db, handle) = mock_db();
        let row = |k: i32, v: &str| -> DatabaseRow {
            let mut row = mock_row([("k", k)]);
            row.insert("v".to_string(), DatabaseValue::from(v));
            row
        };
        handle.expect(
            "SELECT k, v FROM t",
            MockResponse::Rows(vec![row(1, "a"), row(2, "x"), row(1, "b")]),
        );

        let mapping = db
            .query_mapping(&Statement::new("SELECT k, v FROM t", params![]), None, None)
            .unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("1"), Some(&DatabaseValue::from("b")));
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_query_mapping_named_fields() {
        let (mut db, handle) = mock_db();
        let mut row = mock_row([("label", "admin")]);
        row.insert("id".to_string(), DatabaseValue::Long(3));
        handle.expect("SELECT label, id FROM roles", MockResponse::Rows(vec![row]));

        let mapping = db
            .query_mapping(
                &Statement::new("SELECT label, id FROM roles", params![]),
                Some("id"),
                Some("label"),
            )
            .unwrap();
        assert_eq!(mapping.get("3"), Some(&DatabaseValue::from("admin")));
    }

    #[test]
    fn test_get_row_field_pops_in_order() {
        let mut row = mock_row([("a", 1), ("b", 2)]);
        assert_eq!(Database::get_row_field(&mut row, None).unwrap(), DatabaseValue::Int(1));
        assert_eq!(Database::get_row_field(&mut row, None).unwrap(), DatabaseValue::Int(2));
        assert!(matches!(
            Database::get_row_field(&mut row, None),
            Err(DatabaseError::ColumnNotFound(_))
        ));

        let mut row = mock_row([("a", 1)]);
        assert!(Database::get_row_field(&mut row, Some("b")).is_err());
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_nested_transactions_reach_engine_once() {
        let (mut db, handle) = mock_db();
        db.start_transaction().unwrap();
        db.start_transaction().unwrap();
        db.commit().unwrap();
        assert!(db.is_transaction_open());
        db.commit().unwrap();
        assert!(!db.is_transaction_open());

        assert_eq!(handle.executed(), vec!["START TRANSACTION", "COMMIT"]);
    }

    #[test]
    fn test_transaction_closure() {
        let (mut db, handle) = mock_db();
        handle.expect("DELETE FROM t", MockResponse::Affected(4));

        let affected = db
            .transaction(|db| db.execute(&Statement::new("DELETE FROM t", params![])))
            .unwrap();
        assert_eq!(affected, 4);

        let result: Result<()> = db.transaction(|_| Err(DatabaseError::statement("boom", None)));
        assert_eq!(result.unwrap_err().base_message(), "boom");
        assert_eq!(
            handle.executed(),
            vec![
                "START TRANSACTION",
                "DELETE FROM t",
                "COMMIT",
                "START TRANSACTION",
                "ROLLBACK"
            ]
        );
    }

    #[test]
    fn test_connect_mock_protocol() {
        let params = ConnectionParameters::builder().protocol("mock").build();
        let db = Database::connect(&params).unwrap();
        assert_eq!(db.escape("it's"), "it\\'s");

        let params = ConnectionParameters::builder().protocol("Mock").build();
        assert!(Database::connect(&params).is_ok());

        let params = ConnectionParameters::builder().protocol("oracle").build();
        assert!(matches!(
            Database::connect(&params),
            Err(DatabaseError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_close() {
        let (mut db, handle) = mock_db();
        db.close().unwrap();
        assert!(handle.is_closed());
        assert!(db.start_transaction().is_err());
    }
}
