//! Dialect implementations
//!
//! These are always compiled, independently of the backend features, so statements can be
//! prepared (and tested through the mock engine) for any engine family.

pub mod mysql;
pub mod sqlite;

pub use mysql::MysqlDialect;
pub use sqlite::SqliteDialect;
