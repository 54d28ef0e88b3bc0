//! Connection parameters

use serde::{Deserialize, Serialize};

use super::config::Config;
use super::database_types::DatabaseType;
use super::error::Result;

/// Everything needed to open one connection
///
/// Constructed once, never mutated. Every field may be absent from a configuration
/// document and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParameters {
    protocol: String,
    host: String,
    port: Option<u16>,
    username: String,
    password: String,
    database: String,
}

impl ConnectionParameters {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Read the parameters stored under `key` (conventionally `"db"`)
    pub fn from_config(config: &Config, key: &str) -> Result<Self> {
        config.get_as(key)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// The engine family selected by the protocol
    pub fn database_type(&self) -> Result<DatabaseType> {
        self.protocol.parse()
    }

    /// Port, falling back to the protocol's default
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or_else(|| {
            self.database_type()
                .ok()
                .and_then(|db_type| db_type.default_port())
        })
    }
}

/// Fluent constructor for [`ConnectionParameters`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    params: ConnectionParameters,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protocol, e.g. `mysql` or `sqlite`
    #[must_use]
    pub fn protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.params.protocol = protocol.into();
        self
    }

    /// Set the database host
    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.params.host = host.into();
        self
    }

    /// Set the database port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.params.port = Some(port);
        self
    }

    /// Set the username
    #[must_use]
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.params.username = username.into();
        self
    }

    /// Set the password
    #[must_use]
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.params.password = password.into();
        self
    }

    /// Set the database name (the file path for SQLite)
    #[must_use]
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.params.database = database.into();
        self
    }

    pub fn build(self) -> ConnectionParameters {
        self.params
    }
}
