//! # abavee_db
//!
//! A portable SQL layer: application code builds statements declaratively, a per-engine
//! dialect turns them into native SQL, and a synchronous engine runs them on one
//! connection with nested-transaction counting.
//!
//! ## Features
//!
//! - **Statement builders**: SELECT, INSERT, UPDATE and DELETE with sub-queries as parameters
//! - **Dialects**: MySQL-family and SQLite literal escaping, LIMIT syntax and transaction control
//! - **Nested transactions**: only the outermost start/commit reaches the database
//! - **Result shapes**: row, cell, column, key→value mapping and full tables
//! - **Test double**: scripted [`backends::MockEngine`] with an inspectable statement log
//!
//! ## Supported Databases
//!
//! | Database | Feature | Protocols |
//! |----------|---------|-----------|
//! | SQLite | `sqlite` (default) | `sqlite`, `sqlite3` |
//! | MySQL / MariaDB | `mysql` | `mysql`, `mariadb` |
//! | Mock | always | `mock` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use abavee_db::prelude::*;
//! use abavee_db::params;
//!
//! fn main() -> Result<()> {
//!     let params = ConnectionParameters::builder()
//!         .protocol("sqlite")
//!         .database("app.db")
//!         .build();
//!     let mut db = Database::connect(&params)?;
//!
//!     db.execute(&NativeStatement::new(
//!         "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)",
//!     ))?;
//!     db.insert(&InsertBuilder::new("users").set("name", "Alice"))?;
//!
//!     let name = db.query_cell(
//!         &SelectBuilder::new()
//!             .fields("name")
//!             .from("users")
//!             .and_where("id=?", params![1]),
//!         None,
//!         false,
//!     )?;
//!     println!("User: {:?}", name);
//!     Ok(())
//! }
//! ```
//!
//! ### Working with Transactions
//!
//! ```rust,no_run
//! use abavee_db::prelude::*;
//! use abavee_db::params;
//!
//! fn transfer(db: &mut Database) -> Result<()> {
//!     db.transaction(|db| {
//!         db.execute(
//!             &UpdateBuilder::new("accounts")
//!                 .set_raw("balance", "balance-100")
//!                 .and_where("id=?", params![1]),
//!         )?;
//!         db.execute(
//!             &UpdateBuilder::new("accounts")
//!                 .set_raw("balance", "balance+100")
//!                 .and_where("id=?", params![2]),
//!         )?;
//!         Ok(())
//!     })
//! }
//! ```

/// Core database system types and traits
pub mod core;

/// Engine implementations
pub mod backends;

/// Dialect implementations
pub mod dialects;

/// Prelude for convenient imports
///
/// ```rust
/// use abavee_db::prelude::*;
///
/// let query = SelectBuilder::new().from("users").limit(10);
/// assert_eq!(query.build(), "SELECT * FROM users LIMIT 10");
/// ```
pub mod prelude {
    pub use crate::core::{
        Config, ConnectionBuilder, ConnectionParameters, Database, DatabaseError,
        DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue, DeleteBuilder, Dialect,
        InsertBuilder, NativeStatement, OrderDirection, Param, Result, ResultSet,
        SelectBuilder, Sql, Statement, TransactionGuard, UpdateBuilder,
    };
    pub use crate::dialects::{MysqlDialect, SqliteDialect};

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteEngine;
}

// Re-export at root level for convenience
pub use crate::core::{
    Config, ConnectionBuilder, ConnectionParameters, Database, DatabaseError, DatabaseResult,
    DatabaseRow, DatabaseType, DatabaseValue, DeleteBuilder, Dialect, Engine, InsertBuilder,
    NativeStatement, OrderDirection, Param, PrimitiveType, Result, ResultSet, SelectBuilder,
    Sql, Statement, TransactionGuard, UpdateBuilder,
};
pub use crate::dialects::{MysqlDialect, SqliteDialect};

#[cfg(feature = "mysql")]
pub use crate::backends::MysqlEngine;
#[cfg(feature = "sqlite")]
pub use crate::backends::SqliteEngine;
