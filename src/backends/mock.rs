//! Scripted in-memory engine for tests
//!
//! The script is an ordered list of expected SQL texts, each with the response it
//! produces. Statements are matched strictly in order. Transaction control and
//! connection initializers are accepted without being scripted, but every statement is
//! recorded in the log.
//!
//! ```
//! use abavee_db::backends::mock::{mock_row, MockEngine, MockResponse};
//! use abavee_db::{Database, SelectBuilder};
//!
//! let engine = MockEngine::new();
//! let handle = engine.handle();
//! handle.expect("SELECT name FROM users", MockResponse::Rows(vec![mock_row([("name", "Ann")])]));
//!
//! let mut db = Database::new(engine);
//! let name = db
//!     .query_cell(&SelectBuilder::new().fields("name").from("users"), None, false)
//!     .unwrap();
//! assert_eq!(name.and_then(|v| v.as_str().map(str::to_string)), Some("Ann".to_string()));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::connection::ConnectionParameters;
use crate::core::dialect::Dialect;
use crate::core::engine::{
    ensure_protocol, initialize, BufferedCursor, CursorTable, Engine, ResultHandle, RowCursor,
    TransactionDepth,
};
use crate::core::error::{DatabaseError, Result};
use crate::core::statement::{NativeStatement, Statement};
use crate::core::value::{DatabaseRow, DatabaseValue};
use crate::dialects::MysqlDialect;

const SUPPORTED_PROTOCOLS: &[&str] = &["mock"];

/// What a scripted statement produces
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// Affected row count for `execute`
    Affected(u64),
    /// Generated id for `insert`
    InsertId(i64),
    /// Rows for `query`
    Rows(Vec<DatabaseRow>),
    /// Engine-level failure with this message
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<(String, MockResponse)>,
    executed: Vec<String>,
    released: usize,
    closed: bool,
}

/// Shared view of a [`MockEngine`]'s script and log, usable after the engine has been
/// moved into a `Database`
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Append an expected statement to the script
    pub fn expect(&self, sql: impl Into<String>, response: MockResponse) -> &Self {
        self.state.lock().script.push_back((sql.into(), response));
        self
    }

    /// Every SQL text sent to the engine, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Scripted statements not yet consumed
    pub fn remaining(&self) -> usize {
        self.state.lock().script.len()
    }

    /// How many result cursors have been released
    pub fn released_cursors(&self) -> usize {
        self.state.lock().released
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Build a row from `(field, value)` pairs, keeping their order
pub fn mock_row<I, K, V>(fields: I) -> DatabaseRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DatabaseValue>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

struct MockCursor {
    rows: BufferedCursor,
    state: Arc<Mutex<MockState>>,
}

impl RowCursor for MockCursor {
    fn next_row(&mut self) -> Result<Option<DatabaseRow>> {
        self.rows.next_row()
    }

    fn release(&mut self) {
        self.rows.release();
        self.state.lock().released += 1;
    }
}

/// Scripted test double
pub struct MockEngine {
    dialect: Box<dyn Dialect>,
    state: Arc<Mutex<MockState>>,
    depth: TransactionDepth,
    cursors: CursorTable,
}

impl MockEngine {
    /// Unconnected engine with the MySQL dialect; no initializers are run
    pub fn new() -> Self {
        Self::with_dialect(Box::new(MysqlDialect::new()))
    }

    pub fn with_dialect(dialect: Box<dyn Dialect>) -> Self {
        Self {
            dialect,
            state: Arc::new(Mutex::new(MockState::default())),
            depth: TransactionDepth::new(),
            cursors: CursorTable::new(),
        }
    }

    /// Validate the protocol and run the dialect's initializers, like a real engine
    pub fn connect(params: &ConnectionParameters, dialect: Box<dyn Dialect>) -> Result<Self> {
        ensure_protocol(params, SUPPORTED_PROTOCOLS)?;
        let mut engine = Self::with_dialect(dialect);
        initialize(&mut engine)?;
        Ok(engine)
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Consume the next scripted response for `statement`
    fn respond(&mut self, statement: &NativeStatement) -> Result<MockResponse> {
        let sql = statement.as_str();
        debug!(sql, "mock statement");

        let mut state = self.state.lock();
        if state.closed {
            return Err(DatabaseError::statement(
                "connection is closed",
                Some(Statement::from(statement)),
            ));
        }
        state.executed.push(sql.to_string());

        let (expected, response) = match state.script.pop_front() {
            Some(entry) => entry,
            None => {
                return Err(DatabaseError::statement(
                    "no test data found",
                    Some(Statement::from(statement)),
                ))
            }
        };

        if expected != sql {
            return Err(DatabaseError::statement(
                format!("unexpected statement, expected [{}]", expected),
                Some(Statement::from(statement)),
            ));
        }

        match response {
            MockResponse::Fail(message) => {
                Err(DatabaseError::statement(message, Some(Statement::from(statement))))
            }
            response => Ok(response),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatched(response: &MockResponse, statement: &NativeStatement) -> DatabaseError {
    DatabaseError::statement(
        format!("scripted response {:?} does not fit this call", response),
        Some(Statement::from(statement)),
    )
}

impl Engine for MockEngine {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    fn escape(&self, text: &str) -> String {
        self.dialect.escape_str(text)
    }

    fn execute_primitive(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "mock primitive");
        let mut state = self.state.lock();
        if state.closed {
            return Err(DatabaseError::statement("connection is closed", None));
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    fn execute(&mut self, statement: &NativeStatement) -> Result<u64> {
        match self.respond(statement)? {
            MockResponse::Affected(count) => Ok(count),
            MockResponse::Rows(rows) => Ok(rows.len() as u64),
            other => Err(mismatched(&other, statement)),
        }
    }

    fn insert(&mut self, statement: &NativeStatement) -> Result<i64> {
        match self.respond(statement)? {
            MockResponse::InsertId(id) => Ok(id),
            other => Err(mismatched(&other, statement)),
        }
    }

    fn query(&mut self, statement: &NativeStatement) -> Result<ResultHandle> {
        match self.respond(statement)? {
            MockResponse::Rows(rows) => {
                let cursor = MockCursor {
                    rows: BufferedCursor::new(rows),
                    state: Arc::clone(&self.state),
                };
                Ok(self.cursors.register(Box::new(cursor)))
            }
            other => Err(mismatched(&other, statement)),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.cursors.release_all();
        self.state.lock().closed = true;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_consumed_in_order() {
        let mut engine = MockEngine::new();
        let handle = engine.handle();
        handle
            .expect("DELETE FROM a", MockResponse::Affected(2))
            .expect("INSERT INTO a (x) VALUES (1)", MockResponse::InsertId(9));

        assert_eq!(engine.execute(&NativeStatement::new("DELETE FROM a")).unwrap(), 2);
        assert_eq!(
            engine
                .insert(&NativeStatement::new("INSERT INTO a (x) VALUES (1)"))
                .unwrap(),
            9
        );
        assert_eq!(handle.remaining(), 0);
        assert_eq!(
            handle.executed(),
            vec!["DELETE FROM a", "INSERT INTO a (x) VALUES (1)"]
        );
    }

    #[test]
    fn test_unexpected_statement() {
        let mut engine = MockEngine::new();
        engine
            .handle()
            .expect("DELETE FROM a", MockResponse::Affected(1));

        let err = engine
            .execute(&NativeStatement::new("DELETE FROM b"))
            .unwrap_err();
        assert_eq!(err.base_message(), "unexpected statement, expected [DELETE FROM a]");
        assert_eq!(err.statement_ref().map(|s| s.template()), Some("DELETE FROM b"));
    }

    #[test]
    fn test_empty_script() {
        let mut engine = MockEngine::new();
        let err = engine.query(&NativeStatement::new("SELECT 1")).unwrap_err();
        assert_eq!(err.base_message(), "no test data found");
    }

    #[test]
    fn test_scripted_failure() {
        let mut engine = MockEngine::new();
        engine
            .handle()
            .expect("SELECT x", MockResponse::Fail("Unknown column 'x'".to_string()));
        let err = engine.query(&NativeStatement::new("SELECT x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown column 'x' on executing [SELECT x] with parameters []"
        );
    }

    #[test]
    fn test_connect_runs_initializers() {
        let params = ConnectionParameters::builder().protocol("mock").build();
        let engine = MockEngine::connect(&params, Box::new(MysqlDialect::new())).unwrap();
        assert_eq!(
            engine.handle().executed(),
            vec!["SET NAMES utf8", "SET AUTOCOMMIT=0"]
        );

        let params = ConnectionParameters::builder().protocol("mysql").build();
        assert!(matches!(
            MockEngine::connect(&params, Box::new(MysqlDialect::new())),
            Err(DatabaseError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_close_releases_unclaimed_cursors() {
        let mut engine = MockEngine::new();
        let handle = engine.handle();
        handle.expect("SELECT 1", MockResponse::Rows(vec![mock_row([("1", 1)])]));

        engine.query(&NativeStatement::new("SELECT 1")).unwrap();
        engine.close().unwrap();

        assert_eq!(handle.released_cursors(), 1);
        assert!(handle.is_closed());
        assert!(engine.execute_primitive("COMMIT").is_err());
    }
}
