//! Engine implementations
//!
//! Vendor engines are gated behind their cargo features. The scripted mock engine is
//! always available.

pub mod mock;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use mock::{MockEngine, MockHandle, MockResponse};
#[cfg(feature = "mysql")]
pub use mysql::MysqlEngine;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;
