//! Invocation input and the context handed to command handlers.

use crate::error::{CommandError, CommandResult};
use crate::options::CommandOptions;
use serde_json::{Map, Value};
use uuid::Uuid;
use warden_common::{ChannelId, GuildId, UserId};

/// A raw command invocation as delivered by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Invoking user.
    pub user_id: UserId,
    /// Guild the command was used in, `None` in private messages.
    pub guild_id: Option<GuildId>,
    /// Channel the command was used in.
    pub channel_id: Option<ChannelId>,
    /// Command name.
    pub command: String,
    /// Options exactly as received.
    pub raw_options: Map<String, Value>,
}

impl Invocation {
    /// An invocation of `command` by `user_id` without options.
    pub fn new(user_id: UserId, command: impl Into<String>) -> Self {
        Self {
            user_id,
            guild_id: None,
            channel_id: None,
            command: command.into(),
            raw_options: Map::new(),
        }
    }

    /// Sets the guild context.
    pub fn in_guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// Sets the channel context.
    pub fn in_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    /// Adds a raw option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw_options.insert(name.into(), value.into());
        self
    }
}

/// Everything a handler learns about the invocation it serves.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Unique id used to correlate log lines of this invocation.
    pub invocation_id: Uuid,
    /// Invoking user.
    pub user_id: UserId,
    /// Guild context, if any.
    pub guild_id: Option<GuildId>,
    /// Channel context, if any.
    pub channel_id: Option<ChannelId>,
    /// Command name.
    pub command: String,
    /// Normalized options.
    pub options: CommandOptions,
}

impl CommandContext {
    /// Builds the context of `invocation` with already normalized `options`.
    pub fn new(invocation: &Invocation, options: CommandOptions) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            user_id: invocation.user_id,
            guild_id: invocation.guild_id,
            channel_id: invocation.channel_id,
            command: invocation.command.clone(),
            options,
        }
    }

    /// The guild context, failing in private messages.
    pub fn require_guild(&self) -> CommandResult<GuildId> {
        self.guild_id.ok_or(CommandError::GuildOnly)
    }
}
