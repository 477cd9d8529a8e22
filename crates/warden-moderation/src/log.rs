//! Append-only moderation action log.

use crate::escalation::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use warden_common::{truncate_string, ChannelId, GuildId, MessageId, UserId};
use warden_store::schema::MODERATION_LOGS;
use warden_store::{
    id_value, Conditions, Row, RowExt, SelectOptions, SortOrder, Store, StoreError, StoreResult,
};

/// Longest stored excerpt of a message body, in characters.
pub const SNIPPET_LENGTH: usize = 100;

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    /// A sanction was decided.
    Sanction(Action),
    /// A whitelisted member's violation was let through.
    WhitelistBypass,
}

impl LogAction {
    /// Stored name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sanction(action) => action.as_str(),
            Self::WhitelistBypass => "whitelist_bypass",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "whitelist_bypass" => Some(Self::WhitelistBypass),
            other => other.parse().ok().map(Self::Sanction),
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a logged event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    /// The sanction took effect.
    Applied,
    /// The member was banned already.
    AlreadyBanned,
    /// The bot could not act on the member.
    InsufficientStanding,
    /// The gateway rejected the sanction.
    Failed,
    /// The member is whitelisted.
    Bypassed,
}

impl LogOutcome {
    /// Stored name of the outcome.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AlreadyBanned => "already_banned",
            Self::InsufficientStanding => "insufficient_standing",
            Self::Failed => "failed",
            Self::Bypassed => "bypassed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "applied" => Some(Self::Applied),
            "already_banned" => Some(Self::AlreadyBanned),
            "insufficient_standing" => Some(Self::InsufficientStanding),
            "failed" => Some(Self::Failed),
            "bypassed" => Some(Self::Bypassed),
            _ => None,
        }
    }
}

impl fmt::Display for LogOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One moderation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationLogEntry {
    /// Author of the message.
    pub user_id: UserId,
    /// Guild of the message.
    pub guild_id: GuildId,
    /// Channel of the message.
    pub channel_id: ChannelId,
    /// The offending message.
    pub message_id: MessageId,
    /// What happened.
    pub action: LogAction,
    /// Whether it took effect.
    pub outcome: LogOutcome,
    /// Start of the message body.
    pub content_snippet: String,
    /// Keywords found in the message.
    pub detected_keywords: Vec<String>,
    /// Time of the event.
    pub created_at: DateTime<Utc>,
}

impl ModerationLogEntry {
    /// Builds an entry for `content`, truncated to [`SNIPPET_LENGTH`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        message_id: MessageId,
        action: LogAction,
        outcome: LogOutcome,
        content: &str,
        detected_keywords: Vec<String>,
    ) -> Self {
        Self {
            user_id,
            guild_id,
            channel_id,
            message_id,
            action,
            outcome,
            content_snippet: truncate_string(content, SNIPPET_LENGTH),
            detected_keywords,
            created_at: Utc::now(),
        }
    }

    /// Decodes a `moderation_logs` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let raw_action = row.get_str("action_type")?;
        let action = LogAction::parse(raw_action)
            .ok_or_else(|| StoreError::decode("action_type", format!("unknown action '{raw_action}'")))?;
        // Rows written before outcomes were recorded only hold applied sanctions
        let outcome = match row.get_opt_str("outcome") {
            None => LogOutcome::Applied,
            Some(raw) => LogOutcome::parse(raw)
                .ok_or_else(|| StoreError::decode("outcome", format!("unknown outcome '{raw}'")))?,
        };
        Ok(Self {
            user_id: row.get_id("user_id")?,
            guild_id: row.get_id("guild_id")?,
            channel_id: row.get_id("channel_id")?,
            message_id: row.get_id("message_id")?,
            action,
            outcome,
            content_snippet: row.get_str("content_snippet")?.to_string(),
            detected_keywords: row.get_string_list("detected_keywords")?,
            created_at: row.get_datetime("created_at")?,
        })
    }

    /// Encodes the entry as a `moderation_logs` row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), id_value(self.user_id));
        row.insert("guild_id".into(), id_value(self.guild_id));
        row.insert("channel_id".into(), id_value(self.channel_id));
        row.insert("message_id".into(), id_value(self.message_id));
        row.insert("action_type".into(), Value::from(self.action.as_str()));
        row.insert("outcome".into(), Value::from(self.outcome.as_str()));
        row.insert("content_snippet".into(), Value::from(self.content_snippet.clone()));
        row.insert(
            "detected_keywords".into(),
            Value::from(Value::from(self.detected_keywords.clone()).to_string()),
        );
        row.insert("created_at".into(), Value::from(self.created_at.to_rfc3339()));
        row
    }
}

/// Writes and queries the moderation log.
#[derive(Clone)]
pub struct ModerationLog {
    store: Arc<dyn Store>,
}

impl ModerationLog {
    /// Wraps a store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends `entry`.
    pub async fn append(&self, entry: &ModerationLogEntry) -> StoreResult<i64> {
        self.store.insert(MODERATION_LOGS, entry.to_row()).await
    }

    /// The `limit` most recent entries for `user_id` in `guild_id`.
    pub async fn recent(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        limit: usize,
    ) -> StoreResult<Vec<ModerationLogEntry>> {
        self.store
            .select(
                MODERATION_LOGS,
                &Conditions::new()
                    .eq("guild_id", id_value(guild_id))
                    .eq("user_id", id_value(user_id)),
                &SelectOptions::default()
                    .order_by("id", SortOrder::Descending)
                    .limit(limit),
            )
            .await?
            .iter()
            .map(ModerationLogEntry::from_row)
            .collect()
    }
}

impl fmt::Debug for ModerationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModerationLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_is_truncated() {
        let body = "x".repeat(250);
        let entry = ModerationLogEntry::new(
            GuildId(1),
            UserId(2),
            ChannelId(3),
            MessageId(4),
            LogAction::Sanction(Action::Warning),
            LogOutcome::Applied,
            &body,
            vec!["x".into()],
        );
        assert!(entry.content_snippet.chars().count() <= SNIPPET_LENGTH);
    }

    #[test]
    fn test_row_roundtrip() {
        let entry = ModerationLogEntry::new(
            GuildId(1),
            UserId(2),
            ChannelId(3),
            MessageId(4),
            LogAction::WhitelistBypass,
            LogOutcome::Bypassed,
            "hello spam",
            vec!["spam".into()],
        );
        let decoded = ModerationLogEntry::from_row(&entry.to_row()).unwrap();
        assert_eq!(decoded.action, LogAction::WhitelistBypass);
        assert_eq!(decoded.outcome, LogOutcome::Bypassed);
        assert_eq!(decoded.detected_keywords, vec!["spam"]);
        assert_eq!(decoded.content_snippet, "hello spam");
    }

    #[test]
    fn test_rows_without_outcome_read_as_applied() {
        let entry = ModerationLogEntry::new(
            GuildId(1),
            UserId(2),
            ChannelId(3),
            MessageId(4),
            LogAction::Sanction(Action::Kick),
            LogOutcome::Failed,
            "spam",
            vec!["spam".into()],
        );
        let mut row = entry.to_row();
        assert_eq!(ModerationLogEntry::from_row(&row).unwrap().outcome, LogOutcome::Failed);

        row.remove("outcome");
        assert_eq!(ModerationLogEntry::from_row(&row).unwrap().outcome, LogOutcome::Applied);
    }
}
