//! Moderation error types.

use crate::gateway::GatewayError;
use thiserror::Error;
use warden_common::WardenError;
use warden_store::StoreError;

/// Result alias for moderation operations.
pub type ModerationResult<T> = Result<T, ModerationError>;

/// Errors raised by moderation management operations.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// Rejected input, e.g. a blank keyword or an out of range threshold.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The store rejected or could not serve the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The chat gateway refused an action.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ModerationError {
    /// Create a validation error for `field`.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<ModerationError> for WardenError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::Validation { field, message } => {
                WardenError::validation_field(message, field)
            }
            other => WardenError::moderation_with_source("Moderation operation failed", other),
        }
    }
}
