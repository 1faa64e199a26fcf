//! Common error types for the review validator

use thiserror::Error;

/// Common result type for review operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the warehouse clients, converters and services
#[derive(Error, Debug)]
pub enum Error {
    /// Warehouse or vector endpoint could not be reached, or rejected our credentials
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement was accepted by the warehouse but failed to execute
    #[error("Query failed: {message}")]
    Query { message: String, sql: String },

    /// Row or payload did not have the expected shape
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Row-grouping was asked to convert an empty partition
    #[error("Conversion error: empty row group")]
    EmptyGroup,

    /// A partition contained rows for more than one survey response
    #[error("Mixed response IDs in rows: {expected} vs {found}")]
    MixedResponseIds { expected: String, found: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local database error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a query error carrying the statement that failed
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Error::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }
}
