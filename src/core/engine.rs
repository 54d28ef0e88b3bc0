//! Engine abstraction
//!
//! An [`Engine`] owns exactly one physical connection and executes native statements on
//! it. The nested-transaction bookkeeping and the result-handle registry are small
//! helpers every implementation embeds, so the provided trait methods can drive them.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::{debug, warn};

use super::connection::ConnectionParameters;
use super::dialect::Dialect;
use super::error::{DatabaseError, Result};
use super::result_set::ResultSet;
use super::statement::NativeStatement;
use super::value::DatabaseRow;

/// Opaque reference to an open query result held by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultHandle(u64);

impl ResultHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Forward-only source of rows for one query
pub trait RowCursor: Send {
    /// Fetch the next row, `None` once the rows are exhausted
    fn next_row(&mut self) -> Result<Option<DatabaseRow>>;

    /// Free the engine-side resource. Called exactly once by the owner of the cursor.
    fn release(&mut self) {}
}

/// Cursor over rows that were fully read from the connection up front
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<DatabaseRow>,
}

impl BufferedCursor {
    pub fn new(rows: Vec<DatabaseRow>) -> Self {
        Self { rows: rows.into() }
    }

    /// Rows not yet fetched
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowCursor for BufferedCursor {
    fn next_row(&mut self) -> Result<Option<DatabaseRow>> {
        Ok(self.rows.pop_front())
    }

    fn release(&mut self) {
        self.rows.clear();
    }
}

/// Registry of query results that have been opened but not yet claimed
#[derive(Default)]
pub struct CursorTable {
    next_id: u64,
    open: HashMap<u64, Box<dyn RowCursor>>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cursor and hand out its handle
    pub fn register(&mut self, cursor: Box<dyn RowCursor>) -> ResultHandle {
        self.next_id += 1;
        self.open.insert(self.next_id, cursor);
        ResultHandle(self.next_id)
    }

    /// Claim the cursor behind `handle`; a handle can be claimed only once
    pub fn take(&mut self, handle: ResultHandle) -> Result<Box<dyn RowCursor>> {
        self.open.remove(&handle.0).ok_or_else(|| {
            DatabaseError::statement(format!("invalid result handle {}", handle), None)
        })
    }

    /// Number of unclaimed results
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Release every unclaimed cursor
    pub fn release_all(&mut self) {
        for (_, mut cursor) in self.open.drain() {
            cursor.release();
        }
    }
}

impl fmt::Debug for CursorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorTable")
            .field("next_id", &self.next_id)
            .field("open", &self.open.len())
            .finish()
    }
}

/// Nested transaction counter
///
/// Only the outermost start and the matching outermost commit reach the database.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionDepth(u32);

impl TransactionDepth {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_open(&self) -> bool {
        self.0 > 0
    }

    fn increment(&mut self) {
        self.0 += 1;
    }

    fn decrement(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Fail unless `params` names one of the `supported` protocols, ignoring ASCII case
pub fn ensure_protocol(params: &ConnectionParameters, supported: &[&str]) -> Result<()> {
    let protocol = params.protocol();
    if supported.iter().any(|p| p.eq_ignore_ascii_case(protocol)) {
        Ok(())
    } else {
        Err(DatabaseError::UnsupportedProtocol(
            params.protocol().to_string(),
        ))
    }
}

/// Run the dialect's connection initializers on a freshly opened engine
pub fn initialize(engine: &mut dyn Engine) -> Result<()> {
    for sql in engine.dialect().connection_initializers() {
        engine.execute_primitive(&sql)?;
    }
    Ok(())
}

/// One connection to one database
///
/// An engine is not internally synchronized; it serves one logical flow of control.
/// `start_transaction`/`commit` calls must be balanced by the caller. Committing more
/// often than starting is not detected as an error.
pub trait Engine: Send {
    /// The dialect statements are prepared with before they reach this engine
    fn dialect(&self) -> &dyn Dialect;

    /// Escape text for inclusion in a raw SQL literal
    fn escape(&self, text: &str) -> String;

    /// Run engine-internal SQL (initializers, transaction control)
    fn execute_primitive(&mut self, sql: &str) -> Result<()>;

    /// Run a statement, returning the number of affected rows
    fn execute(&mut self, statement: &NativeStatement) -> Result<u64>;

    /// Run an INSERT, returning the generated id
    fn insert(&mut self, statement: &NativeStatement) -> Result<i64>;

    /// Run a query, returning a handle to its open result
    fn query(&mut self, statement: &NativeStatement) -> Result<ResultHandle>;

    /// Close the connection. Further operations fail.
    fn close(&mut self) -> Result<()>;

    fn transaction_depth(&self) -> &TransactionDepth;

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth;

    /// Results opened by `query` and not yet claimed
    fn cursors(&mut self) -> &mut CursorTable;

    /// Begin a (possibly nested) transaction
    fn start_transaction(&mut self) -> Result<()> {
        if !self.transaction_depth().is_open() {
            let sql = self.dialect().start_transaction_sql();
            self.execute_primitive(sql)?;
        }
        self.transaction_depth_mut().increment();
        debug!(depth = self.transaction_depth().get(), "transaction started");
        Ok(())
    }

    /// Commit; only the outermost commit reaches the database
    fn commit(&mut self) -> Result<()> {
        match self.transaction_depth().get() {
            0 => {
                warn!("commit called without an open transaction, ignoring");
                return Ok(());
            }
            1 => {
                let sql = self.dialect().commit_sql();
                self.execute_primitive(sql)?;
            }
            _ => {}
        }
        self.transaction_depth_mut().decrement();
        debug!(depth = self.transaction_depth().get(), "transaction committed");
        Ok(())
    }

    /// Roll back the whole transaction, whatever the nesting depth
    fn rollback(&mut self) -> Result<()> {
        let sql = self.dialect().rollback_sql();
        let result = self.execute_primitive(sql);
        self.transaction_depth_mut().reset();
        debug!("transaction rolled back");
        result
    }

    fn is_transaction_open(&self) -> bool {
        self.transaction_depth().is_open()
    }

    /// Read the first row of a result and release the rest
    fn fetch_first_row_only(&mut self, handle: ResultHandle) -> Result<Option<DatabaseRow>> {
        let mut cursor = self.cursors().take(handle)?;
        let row = cursor.next_row();
        cursor.release();
        debug!(%handle, "result cursor released");
        row
    }

    /// Wrap a result into a forward-only result set
    fn result_set_for(&mut self, handle: ResultHandle, auto_close: bool) -> Result<ResultSet> {
        let cursor = self.cursors().take(handle)?;
        Ok(ResultSet::new(cursor, auto_close))
    }
}
