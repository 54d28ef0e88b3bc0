//! Error types for the database layer
//!
//! Every failure surfaces as a [`DatabaseError`]. Whatever the variant, the error can be
//! asked for its base message (without statement information) and for the statement that
//! caused it, so the caller can render its own diagnostics.

use super::statement::Statement;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The engine does not speak the requested protocol
    #[error("Cannot connect because protocol \"{0}\" is not supported by this engine")]
    UnsupportedProtocol(String),

    /// Connection failed with details
    #[error("Connection failed to {host}:{port} - {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Engine-level failure while running a statement
    #[error("{}", describe(.message, .statement.as_ref()))]
    Statement {
        message: String,
        statement: Option<Statement>,
    },

    /// A single-row query returned nothing
    #[error("{}", describe_empty(.statement))]
    EmptyResult { statement: Statement },

    /// A value could not be converted to or from its SQL representation
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The result set was closed before iteration finished
    #[error("Result set is already closed")]
    ResultSetClosed,

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

const EMPTY_RESULT_MESSAGE: &str = "the query returned an empty resultset";

/// Renders `message` followed by the statement text and its parameter list.
fn describe(message: &str, statement: Option<&Statement>) -> String {
    match statement {
        None => message.to_string(),
        Some(statement) => format!(
            "{} on executing [{}] with parameters [{}]",
            message,
            statement.template(),
            statement.describe_params()
        ),
    }
}

fn describe_empty(statement: &Statement) -> String {
    describe(EMPTY_RESULT_MESSAGE, Some(statement))
}

impl DatabaseError {
    /// Create a connection failed error with source error
    pub fn connection_failed_with_source(
        host: impl Into<String>,
        port: u16,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DatabaseError::ConnectionFailed {
            host: host.into(),
            port,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a statement error, optionally carrying the offending statement
    pub fn statement<S: Into<String>>(msg: S, statement: Option<Statement>) -> Self {
        DatabaseError::Statement {
            message: msg.into(),
            statement,
        }
    }

    /// Create an empty-result error for the given statement
    pub fn empty_result(statement: Statement) -> Self {
        DatabaseError::EmptyResult { statement }
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Encoding(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Configuration(msg.into())
    }

    /// The error message without the statement information
    pub fn base_message(&self) -> String {
        match self {
            DatabaseError::Statement { message, .. } => message.clone(),
            DatabaseError::EmptyResult { .. } => EMPTY_RESULT_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// The statement that caused the error, if one was involved
    pub fn statement_ref(&self) -> Option<&Statement> {
        match self {
            DatabaseError::Statement { statement, .. } => statement.as_ref(),
            DatabaseError::EmptyResult { statement } => Some(statement),
            _ => None,
        }
    }
}
