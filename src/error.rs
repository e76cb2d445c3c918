//! Error types shared by every layer of the crate.

use thiserror::Error;

use crate::value::DataType;

/// Errors raised by sessions, connections and resource lookups.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Resource script '{0}' couldn't be found.")]
    ScriptNotFound(String),

    #[error("Resource file '{0}' couldn't be found.")]
    ResourceFileNotFound(String),

    #[error("Resource key '{key}' couldn't be found in '{bundle}'.")]
    ResourceKeyNotFound { bundle: String, key: String },

    #[error("File '{0}' couldn't be found.")]
    FileNotFound(String),

    /// Commit or rollback requested while no transaction is open.
    #[error("cannot {operation}: no transaction is open")]
    NoTransaction { operation: &'static str },

    /// A placeholder in the SQL text received no parameter.
    #[error("Insufficient parameters supplied to the command: no value for '{0}'")]
    UnboundParameter(String),

    #[error("column '{0}' is not part of the result row")]
    ColumnNotFound(String),

    #[error("cannot convert {from} value to {to}")]
    Conversion { from: DataType, to: &'static str },

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("resource bundle '{bundle}' is malformed: {message}")]
    InvalidBundle { bundle: String, message: String },

    #[error(transparent)]
    Driver(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub fn conversion(from: DataType, to: &'static str) -> Self {
        Self::Conversion { from, to }
    }

    pub fn no_transaction(operation: &'static str) -> Self {
        Self::NoTransaction { operation }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
