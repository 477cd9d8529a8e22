//! Permission error types.

use thiserror::Error;
use warden_common::WardenError;
use warden_store::StoreError;

/// Result alias for permission operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// Errors raised by permission mutations and lookups.
#[derive(Error, Debug)]
pub enum PermissionError {
    /// The role type is not one of `admin`, `moderator`, `helper`.
    #[error("Unknown role type '{0}'")]
    InvalidRole(String),

    /// The permission name is empty or contains whitespace.
    #[error("Invalid permission name '{0}'")]
    InvalidPermission(String),

    /// The store rejected or could not serve the request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PermissionError {
    /// Whether the error is caused by bad input rather than a failing store.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRole(_) | Self::InvalidPermission(_))
    }
}

impl From<PermissionError> for WardenError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::InvalidRole(_) => {
                WardenError::validation_field(err.to_string(), "role")
            }
            PermissionError::InvalidPermission(_) => {
                WardenError::validation_field(err.to_string(), "permission")
            }
            PermissionError::Store(source) => {
                WardenError::permission_with_source("Permission store operation failed", source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_validation_kind() {
        let err: WardenError = PermissionError::InvalidRole("owner".into()).into();
        assert!(err.is_validation());

        let err: WardenError = PermissionError::Store(StoreError::Unavailable).into();
        assert!(!err.is_validation());
    }
}
