//! Transaction guard for automatic rollback on drop
//!
//! This module provides RAII-style transaction management with automatic rollback.

use std::ops::{Deref, DerefMut};

use tracing::{error, warn};

use super::database::Database;
use super::error::Result;

/// Transaction guard that automatically rolls back on drop if not committed
///
/// The guard borrows the database mutably for its whole lifetime and derefs to it, so
/// statements are issued through the guard. Guards nest like any other transaction:
/// an inner guard's commit only decrements the depth.
///
/// ```
/// use abavee_db::backends::mock::{MockEngine, MockResponse};
/// use abavee_db::{params, Database, DeleteBuilder};
///
/// let engine = MockEngine::new();
/// let log = engine.handle();
/// log.expect("DELETE FROM sessions WHERE (user_id=1)", MockResponse::Affected(3));
///
/// let mut db = Database::new(engine);
/// let mut tx = db.begin().unwrap();
/// tx.execute(&DeleteBuilder::new("sessions").and_where("user_id=?", params![1])).unwrap();
/// tx.commit().unwrap();
///
/// assert_eq!(log.executed().last().map(String::as_str), Some("COMMIT"));
/// ```
pub struct TransactionGuard<'a> {
    db: &'a mut Database,
    finished: bool,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start the transaction
    pub fn begin(db: &'a mut Database) -> Result<Self> {
        db.start_transaction()?;
        Ok(Self {
            db,
            finished: false,
        })
    }

    /// Commit the transaction
    ///
    /// After calling this method, the guard will not perform automatic rollback on drop.
    /// A failed commit is not rolled back here; the drop path handles it.
    pub fn commit(mut self) -> Result<()> {
        self.db.commit()?;
        self.finished = true;
        Ok(())
    }

    /// Explicitly rollback the transaction
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.db.rollback()
    }
}

impl Deref for TransactionGuard<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl DerefMut for TransactionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction guard dropped without commit or rollback, rolling back");
        if let Err(e) = self.db.rollback() {
            error!(error = %e, "automatic rollback failed");
        }
    }
}
