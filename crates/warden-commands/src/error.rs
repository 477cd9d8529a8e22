//! Command error types.

use thiserror::Error;
use warden_common::WardenError;
use warden_moderation::ModerationError;
use warden_permissions::PermissionError;
use warden_store::StoreError;

/// Result alias for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised while validating or executing a command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Bad input from the invoker. The message is shown to them verbatim.
    #[error("{0}")]
    Validation(String),

    /// The command needs a guild context.
    #[error("This command can only be used in a server")]
    GuildOnly,

    /// A permission mutation or lookup failed.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// A moderation operation failed.
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// The store rejected or could not serve the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Whether the error was caused by the invoker's input.
    ///
    /// Such errors are reported back as-is; everything else is replaced by a
    /// generic failure notice.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Validation(_) | Self::GuildOnly => true,
            Self::Permission(e) => e.is_validation(),
            Self::Moderation(ModerationError::Validation { .. }) => true,
            _ => false,
        }
    }
}

impl From<CommandError> for WardenError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Validation(msg) => WardenError::validation(msg),
            CommandError::GuildOnly => WardenError::validation_field(err.to_string(), "guild"),
            CommandError::Permission(e) => e.into(),
            CommandError::Moderation(e) => e.into(),
            CommandError::Store(e) => {
                WardenError::database_with_source("Store operation failed", e)
            }
            CommandError::Failed(msg) => WardenError::new(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(CommandError::validation("bad").is_user_facing());
        assert!(CommandError::GuildOnly.is_user_facing());
        assert!(CommandError::from(PermissionError::InvalidRole("owner".into())).is_user_facing());
        assert!(!CommandError::from(StoreError::Unavailable).is_user_facing());
        assert!(!CommandError::failed("boom").is_user_facing());
    }

    #[test]
    fn test_conversion_into_warden_error() {
        let err: WardenError = CommandError::validation("missing option").into();
        assert!(err.is_validation());
    }
}
