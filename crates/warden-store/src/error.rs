//! Store error types.

use thiserror::Error;
use warden_common::WardenError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`Store`](crate::Store) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("Store is unavailable")]
    Unavailable,

    /// A statement failed to execute.
    #[error("Query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A table or column name contained characters outside `[A-Za-z0-9_]`.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A statement shape was rejected before execution.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The operation is not supported by this store implementation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A stored value did not have the expected shape.
    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl StoreError {
    /// Create a decode error for a column.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the store could not be reached at all.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Self::Unavailable
            }
            other => Self::Query {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<StoreError> for WardenError {
    fn from(err: StoreError) -> Self {
        WardenError::database_with_source("Store operation failed", err)
    }
}
