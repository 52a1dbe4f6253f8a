//! Error types for deltasync core.

use crate::types::Timestamp;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in deltasync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error. The unit of work has been rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] deltasync_storage::StorageError),

    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A request named a table that was never registered.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// Name from the request.
        name: String,
    },

    /// A request or one of its rows does not have the expected shape.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Description of the problem.
        message: String,
    },

    /// A table registration is not usable.
    #[error("invalid table {table}: {message}")]
    InvalidTable {
        /// The table being registered.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// A configured partition column has no value in the caller context.
    #[error("missing value for extra column {column}")]
    MissingExtra {
        /// The partition column.
        column: String,
    },

    /// The caller context carries a value for a column that is not a
    /// configured partition column.
    #[error("unexpected extra column {column}")]
    UnexpectedExtra {
        /// The unknown column.
        column: String,
    },

    /// The freshly drawn timestamp does not lie after the client's.
    #[error("timestamp {next} is not after client timestamp {last}")]
    TimestampNotAfter {
        /// Client's last known timestamp.
        last: Timestamp,
        /// Timestamp drawn for this exchange.
        next: Timestamp,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted with the given arguments.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed-request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid-table error.
    pub fn invalid_table(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true if the caller of an exchange sent something wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownTable { .. }
                | CoreError::MalformedRequest { .. }
                | CoreError::MissingExtra { .. }
                | CoreError::UnexpectedExtra { .. }
                | CoreError::TimestampNotAfter { .. }
        )
    }

    /// Returns true if the exchange may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}
