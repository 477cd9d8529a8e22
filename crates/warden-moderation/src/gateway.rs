//! Side effects the engine asks the chat network to perform.

use crate::escalation::Action;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use warden_common::{ChannelId, GuildId, MessageId, UserId};

/// Errors reported by a [`ModerationGateway`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The bot lacks the standing to act on the member.
    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    /// The target no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request failed in transit or was rejected.
    #[error("Gateway request failed: {0}")]
    Request(String),
}

/// Chat network operations used by the moderation pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModerationGateway: Send + Sync {
    /// Deletes a message.
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), GatewayError>;

    /// Sends a direct message to `user`.
    async fn send_private_notice(&self, user: UserId, content: String) -> Result<(), GatewayError>;

    /// Restricts `user` from communicating in `guild` for `duration`.
    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: String,
    ) -> Result<(), GatewayError>;

    /// Removes `user` from `guild`.
    async fn kick_member(&self, guild: GuildId, user: UserId, reason: String) -> Result<(), GatewayError>;

    /// Permanently removes `user` from `guild`.
    async fn ban_member(&self, guild: GuildId, user: UserId, reason: String) -> Result<(), GatewayError>;

    /// Whether the bot may apply `action` to `user` in `guild`.
    async fn can_sanction(&self, guild: GuildId, user: UserId, action: Action) -> bool;
}
