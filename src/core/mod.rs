//! Engine-agnostic building blocks
//!
//! Statements and builders, the dialect contract, the engine contract with its shared
//! helpers, result sets, the `Database` façade, and connection configuration.

pub mod config;
pub mod connection;
pub mod database;
pub mod database_types;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod query_builder;
pub mod result_set;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::Config;
pub use connection::{ConnectionBuilder, ConnectionParameters};
pub use database::Database;
pub use database_types::DatabaseType;
pub use dialect::Dialect;
pub use engine::{BufferedCursor, CursorTable, Engine, ResultHandle, RowCursor, TransactionDepth};
pub use error::{DatabaseError, Result};
pub use query_builder::{
    DeleteBuilder, InsertBuilder, OrderDirection, SelectBuilder, UpdateBuilder,
};
pub use result_set::ResultSet;
pub use statement::{NativeStatement, Param, Sql, Statement};
pub use transaction::TransactionGuard;
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue, PrimitiveType};
