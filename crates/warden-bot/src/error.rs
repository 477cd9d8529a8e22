//! Application-wide error types using thiserror.

use poise::serenity_prelude as serenity;
use warden_common::WardenError;
use warden_permissions::PermissionError;
use warden_store::StoreError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    /// Configuration or logging setup error.
    #[error("Configuration error: {0}")]
    Config(#[from] WardenError),

    /// Discord/Serenity error.
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    /// The store could not be opened or queried.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Startup permission seeding failed.
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Poise framework error.
    #[error("Framework error: {0}")]
    Framework(String),
}

/// Result type for the bot application.
pub type BotResult<T> = Result<T, BotError>;
