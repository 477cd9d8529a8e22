//! Inbound chat messages.

use serde::{Deserialize, Serialize};
use warden_common::{ChannelId, GuildId, MessageId, UserId};

/// A message delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Author.
    pub author_id: UserId,
    /// Whether the author is an automated account.
    pub author_is_bot: bool,
    /// Guild, absent for direct messages.
    pub guild_id: Option<GuildId>,
    /// Guild display name, used in notices.
    pub guild_name: Option<String>,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Message id.
    pub message_id: MessageId,
    /// Message body.
    pub content: String,
}
