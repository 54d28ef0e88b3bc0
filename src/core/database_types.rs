//! Database type definitions
//!
//! The engine family is selected by the protocol named in the connection parameters.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::dialect::Dialect;
use super::error::DatabaseError;
use crate::dialects::{MysqlDialect, SqliteDialect};

/// Supported engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// MySQL/MariaDB over the network protocol
    Mysql,
    /// Embedded SQLite
    Sqlite,
    /// In-memory scripted test double
    Mock,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::Mysql => "mysql",
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Mock => "mock",
        }
    }

    /// Port used when the parameters name none
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseType::Mysql => Some(3306),
            DatabaseType::Sqlite | DatabaseType::Mock => None,
        }
    }

    /// The dialect statements are prepared with for this engine family
    pub fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            DatabaseType::Mysql | DatabaseType::Mock => Box::new(MysqlDialect::new()),
            DatabaseType::Sqlite => Box::new(SqliteDialect::new()),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            "mock" => Ok(DatabaseType::Mock),
            _ => Err(DatabaseError::UnsupportedProtocol(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_str() {
        assert_eq!("mysql".parse::<DatabaseType>().ok(), Some(DatabaseType::Mysql));
        assert_eq!("MariaDB".parse::<DatabaseType>().ok(), Some(DatabaseType::Mysql));
        assert_eq!("sqlite3".parse::<DatabaseType>().ok(), Some(DatabaseType::Sqlite));
        assert_eq!("mock".parse::<DatabaseType>().ok(), Some(DatabaseType::Mock));
        assert!(matches!(
            "oracle".parse::<DatabaseType>(),
            Err(DatabaseError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_default_dialects() {
        assert_eq!(DatabaseType::Mysql.dialect().start_transaction_sql(), "START TRANSACTION");
        assert_eq!(DatabaseType::Sqlite.dialect().start_transaction_sql(), "BEGIN TRANSACTION");
        assert_eq!(DatabaseType::Mysql.default_port(), Some(3306));
        assert_eq!(DatabaseType::Sqlite.default_port(), None);
    }
}
