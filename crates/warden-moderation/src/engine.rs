//! The per-message moderation pipeline.

use crate::config::{GuildModerationConfig, ModerationConfigStore};
use crate::escalation::{escalate, Action};
use crate::gateway::ModerationGateway;
use crate::locks::KeyedLocks;
use crate::log::{LogAction, LogOutcome, ModerationLog, ModerationLogEntry};
use crate::message::InboundMessage;
use crate::offenders::{OffenderRecord, OffenderRepository};
use crate::stats::{RealtimeStats, StatCounter, StatsRecorder};
use crate::whitelist::Whitelist;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warden_common::{format_duration, GuildId, UserId};
use warden_config::ModerationDefaults;
use warden_store::Store;

/// Why a message was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sent by an automated account.
    BotAuthor,
    /// Sent outside a guild.
    NoGuild,
    /// Moderation is disabled for the guild.
    Disabled,
    /// No configured keyword matched.
    NoMatch,
    /// The store could not be consulted.
    StoreUnavailable,
}

/// Whether a decided sanction took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanctionStatus {
    /// The sanction was applied.
    Applied,
    /// A ban was due but the member is already banned.
    AlreadyBanned,
    /// The bot lacks the standing to sanction the member.
    InsufficientStanding,
    /// The gateway rejected the sanction.
    Failed(String),
}

/// What happened to a violating message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionReport {
    /// Decided sanction.
    pub action: Action,
    /// Offense count including this violation.
    pub offense_count: u32,
    /// Keywords found.
    pub keywords: Vec<String>,
    /// Whether the message was removed.
    pub message_deleted: bool,
    /// Whether the private notice was delivered.
    pub notice_sent: bool,
    /// Outcome of the sanction.
    pub status: SanctionStatus,
}

/// Result of [`ModerationEngine::process_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The message was not acted on.
    NotProcessed(SkipReason),
    /// A whitelisted member violated the policy; logged and counted only.
    WhitelistBypass {
        /// Keywords found.
        keywords: Vec<String>,
    },
    /// A violation was sanctioned.
    Sanctioned(SanctionReport),
    /// The violation could not be recorded.
    Failed {
        /// Whether the message was removed before the failure.
        message_deleted: bool,
        /// Failure description.
        error: String,
    },
}

/// Scans guild messages and escalates sanctions against repeat offenders.
pub struct ModerationEngine {
    configs: ModerationConfigStore,
    whitelist: Whitelist,
    offenders: OffenderRepository,
    logs: ModerationLog,
    stats: StatsRecorder,
    gateway: Arc<dyn ModerationGateway>,
    member_locks: KeyedLocks<(GuildId, UserId)>,
}

impl ModerationEngine {
    /// Wires the engine over `store` and `gateway`.
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn ModerationGateway>,
        defaults: ModerationDefaults,
        realtime: Arc<RealtimeStats>,
    ) -> Self {
        let ttl = defaults.cache_ttl();
        Self {
            configs: ModerationConfigStore::new(Arc::clone(&store), defaults),
            whitelist: Whitelist::new(Arc::clone(&store), ttl),
            offenders: OffenderRepository::new(Arc::clone(&store)),
            logs: ModerationLog::new(Arc::clone(&store)),
            stats: StatsRecorder::new(store, realtime),
            gateway,
            member_locks: KeyedLocks::new(),
        }
    }

    /// Guild configuration access.
    pub fn configs(&self) -> &ModerationConfigStore {
        &self.configs
    }

    /// Whitelist access.
    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Offender record access.
    pub fn offenders(&self) -> &OffenderRepository {
        &self.offenders
    }

    /// Moderation log access.
    pub fn logs(&self) -> &ModerationLog {
        &self.logs
    }

    /// Statistics access.
    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    /// Runs the moderation pipeline for one message.
    pub async fn process_message(&self, message: &InboundMessage) -> ProcessOutcome {
        if message.author_is_bot {
            return ProcessOutcome::NotProcessed(SkipReason::BotAuthor);
        }
        let Some(guild_id) = message.guild_id else {
            return ProcessOutcome::NotProcessed(SkipReason::NoGuild);
        };
        let user_id = message.author_id;

        let config = match self.configs.get(guild_id).await {
            Ok(config) => config,
            Err(e) => {
                error!(%guild_id, error = %e, "Failed to load moderation configuration");
                return ProcessOutcome::NotProcessed(SkipReason::StoreUnavailable);
            }
        };
        if !config.enabled {
            return ProcessOutcome::NotProcessed(SkipReason::Disabled);
        }

        let whitelisted = match self.whitelist.is_whitelisted(guild_id, user_id).await {
            Ok(whitelisted) => whitelisted,
            Err(e) => {
                error!(%guild_id, %user_id, error = %e, "Failed to check whitelist");
                return ProcessOutcome::NotProcessed(SkipReason::StoreUnavailable);
            }
        };

        let keywords = config.matcher().find_matches(&message.content);
        if keywords.is_empty() {
            return ProcessOutcome::NotProcessed(SkipReason::NoMatch);
        }

        if whitelisted {
            debug!(%guild_id, %user_id, ?keywords, "Whitelisted member bypassed moderation");
            self.append_log(
                message,
                guild_id,
                LogAction::WhitelistBypass,
                LogOutcome::Bypassed,
                &keywords,
            )
            .await;
            self.stats
                .record(guild_id, StatCounter::WhitelistBypasses)
                .await;
            return ProcessOutcome::WhitelistBypass { keywords };
        }

        self.handle_violation(message, guild_id, &config, keywords).await
    }

    async fn handle_violation(
        &self,
        message: &InboundMessage,
        guild_id: GuildId,
        config: &GuildModerationConfig,
        keywords: Vec<String>,
    ) -> ProcessOutcome {
        let user_id = message.author_id;

        let message_deleted = match self
            .gateway
            .delete_message(message.channel_id, message.message_id)
            .await
        {
            Ok(()) => {
                self.stats.record(guild_id, StatCounter::MessagesDeleted).await;
                true
            }
            Err(e) => {
                warn!(%guild_id, message_id = %message.message_id, error = %e, "Failed to delete violating message");
                false
            }
        };

        // Held until the record is saved, so concurrent violations see each other's counts
        let _member = self.member_locks.lock((guild_id, user_id)).await;
        let mut record = match self.offenders.fetch_or_create(guild_id, user_id).await {
            Ok(record) => record,
            Err(e) => {
                error!(%guild_id, %user_id, error = %e, "Failed to load offender record");
                return ProcessOutcome::Failed {
                    message_deleted,
                    error: e.to_string(),
                };
            }
        };

        let offense_count = record.offense_count.saturating_add(1);
        let action = escalate(offense_count, config.thresholds, config.escalation_enabled);
        let notice = self.render_notice(config, message, action, offense_count, &keywords);

        let (status, notice_sent) = self
            .apply(guild_id, user_id, &record, action, config, notice)
            .await;
        match &status {
            SanctionStatus::Applied => {
                info!(%guild_id, %user_id, %action, offense_count, "Applied moderation sanction");
            }
            SanctionStatus::AlreadyBanned => {
                debug!(%guild_id, %user_id, "Offender already banned");
            }
            SanctionStatus::InsufficientStanding => {
                warn!(%guild_id, %user_id, %action, "Insufficient standing to apply sanction");
            }
            SanctionStatus::Failed(reason) => {
                warn!(%guild_id, %user_id, %action, reason = %reason, "Sanction failed");
            }
        }

        self.update_record(&mut record, offense_count, action, &status)
            .await;
        self.append_log(
            message,
            guild_id,
            LogAction::Sanction(action),
            LogOutcome::from(&status),
            &keywords,
        )
        .await;
        if status == SanctionStatus::Applied {
            self.stats
                .record(guild_id, StatCounter::for_action(action))
                .await;
        }

        ProcessOutcome::Sanctioned(SanctionReport {
            action,
            offense_count,
            keywords,
            message_deleted,
            notice_sent,
            status,
        })
    }

    async fn apply(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        record: &OffenderRecord,
        action: Action,
        config: &GuildModerationConfig,
        notice: String,
    ) -> (SanctionStatus, bool) {
        if action == Action::Ban && record.is_banned {
            return (SanctionStatus::AlreadyBanned, false);
        }
        if action != Action::Warning && !self.gateway.can_sanction(guild_id, user_id, action).await {
            return (SanctionStatus::InsufficientStanding, false);
        }

        let reason = format!("Automated moderation: offense #{}", record.offense_count + 1);
        let result = match action {
            Action::Warning => Ok(()),
            Action::Timeout => {
                self.gateway
                    .timeout_member(guild_id, user_id, config.timeout_duration, reason)
                    .await
            }
            Action::Kick => self.gateway.kick_member(guild_id, user_id, reason).await,
            Action::Ban => self.gateway.ban_member(guild_id, user_id, reason).await,
        };

        if let Err(e) = result {
            return (SanctionStatus::Failed(e.to_string()), false);
        }

        // Only sanctions that took effect are announced
        let notice_sent = match self.gateway.send_private_notice(user_id, notice).await {
            Ok(()) => true,
            Err(e) => {
                debug!(%user_id, error = %e, "Could not deliver moderation notice");
                false
            }
        };
        (SanctionStatus::Applied, notice_sent)
    }

    async fn update_record(
        &self,
        record: &mut OffenderRecord,
        offense_count: u32,
        action: Action,
        status: &SanctionStatus,
    ) {
        record.offense_count = offense_count;
        record.escalation_level = Some(action);
        record.last_offense_at = Some(Utc::now());
        if action == Action::Ban && *status == SanctionStatus::Applied {
            record.is_banned = true;
        }
        if let Err(e) = self.offenders.save(record).await {
            error!(guild_id = %record.guild_id, user_id = %record.user_id, error = %e, "Failed to update offender record");
        }
    }

    async fn append_log(
        &self,
        message: &InboundMessage,
        guild_id: GuildId,
        action: LogAction,
        outcome: LogOutcome,
        keywords: &[String],
    ) {
        let entry = ModerationLogEntry::new(
            guild_id,
            message.author_id,
            message.channel_id,
            message.message_id,
            action,
            outcome,
            &message.content,
            keywords.to_vec(),
        );
        if let Err(e) = self.logs.append(&entry).await {
            warn!(%guild_id, action = %action, error = %e, "Failed to append moderation log entry");
        }
    }

    fn render_notice(
        &self,
        config: &GuildModerationConfig,
        message: &InboundMessage,
        action: Action,
        offense_count: u32,
        keywords: &[String],
    ) -> String {
        let template = match action {
            Action::Warning => &config.templates.warning,
            Action::Timeout => &config.templates.timeout,
            Action::Kick => &config.templates.kick,
            Action::Ban => &config.templates.ban,
        };
        let guild = message
            .guild_name
            .clone()
            .unwrap_or_else(|| config.guild_id.to_string());

        render_template(
            template,
            &[
                ("user", format!("<@{}>", message.author_id)),
                ("guild", guild),
                ("count", offense_count.to_string()),
                ("keywords", keywords.join(", ")),
                ("duration", format_duration(config.timeout_duration)),
            ],
        )
    }
}

impl From<&SanctionStatus> for LogOutcome {
    fn from(status: &SanctionStatus) -> Self {
        match status {
            SanctionStatus::Applied => Self::Applied,
            SanctionStatus::AlreadyBanned => Self::AlreadyBanned,
            SanctionStatus::InsufficientStanding => Self::InsufficientStanding,
            SanctionStatus::Failed(_) => Self::Failed,
        }
    }
}

impl std::fmt::Debug for ModerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationEngine")
            .field("configs", &self.configs)
            .field("whitelist", &self.whitelist)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Replaces each `{name}` placeholder in `template`.
pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockModerationGateway};
    use mockall::predicate::*;
    use warden_common::test_utils::discord_fixtures::*;
    use warden_store::MemoryStore;

    fn message(content: &str) -> InboundMessage {
        InboundMessage {
            author_id: test_user_id(),
            author_is_bot: false,
            guild_id: Some(test_guild_id()),
            guild_name: Some("Test Guild".into()),
            channel_id: test_channel_id(),
            message_id: test_message_id(1),
            content: content.into(),
        }
    }

    fn engine(gateway: MockModerationGateway, defaults: ModerationDefaults) -> ModerationEngine {
        ModerationEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(gateway),
            defaults,
            Arc::new(RealtimeStats::new()),
        )
    }

    fn spam_defaults() -> ModerationDefaults {
        ModerationDefaults {
            keywords: vec!["spam".into()],
            ..ModerationDefaults::default()
        }
    }

    #[test]
    fn test_render_template() {
        let text = render_template(
            "{user} in {guild}: #{count} ({keywords}) {unknown}",
            &[
                ("user", "<@1>".into()),
                ("guild", "G".into()),
                ("count", "3".into()),
                ("keywords", "a, b".into()),
            ],
        );
        assert_eq!(text, "<@1> in G: #3 (a, b) {unknown}");
    }

    #[tokio::test]
    async fn test_warning_sends_notice_only() {
        let mut gateway = MockModerationGateway::new();
        gateway
            .expect_delete_message()
            .with(eq(test_channel_id()), eq(test_message_id(1)))
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_send_private_notice()
            .withf(|user, content| *user == test_user_id() && content.contains("Test Guild"))
            .times(1)
            .returning(|_, _| Ok(()));
        gateway.expect_can_sanction().never();
        gateway.expect_timeout_member().never();

        let engine = engine(gateway, spam_defaults());
        let outcome = engine.process_message(&message("buy SPAM")).await;

        let report = match outcome {
            ProcessOutcome::Sanctioned(report) => report,
            other => panic!("expected a sanction, got {other:?}"),
        };
        assert_eq!(report.action, Action::Warning);
        assert_eq!(report.status, SanctionStatus::Applied);
        assert!(report.message_deleted);
        assert!(report.notice_sent);
        assert_eq!(engine.stats().realtime_stats(test_guild_id()).warnings, 1);
    }

    #[tokio::test]
    async fn test_insufficient_standing_is_reported_and_recorded() {
        let mut gateway = MockModerationGateway::new();
        gateway.expect_delete_message().returning(|_, _| Ok(()));
        gateway.expect_can_sanction().returning(|_, _, _| false);
        gateway.expect_send_private_notice().never();
        gateway.expect_timeout_member().never();

        let defaults = ModerationDefaults {
            warning_threshold: 0,
            ..spam_defaults()
        };
        let engine = engine(gateway, defaults);
        let outcome = engine.process_message(&message("spam")).await;

        let report = match outcome {
            ProcessOutcome::Sanctioned(report) => report,
            other => panic!("expected a sanction, got {other:?}"),
        };
        assert_eq!(report.action, Action::Timeout);
        assert_eq!(report.status, SanctionStatus::InsufficientStanding);

        let record = engine
            .offenders()
            .find(test_guild_id(), test_user_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.offense_count, 1);
        let counts = engine.stats().realtime_stats(test_guild_id());
        assert_eq!(counts.timeouts, 0);
        assert_eq!(counts.messages_deleted, 1);
    }

    #[tokio::test]
    async fn test_failed_delete_continues() {
        let mut gateway = MockModerationGateway::new();
        gateway
            .expect_delete_message()
            .returning(|_, _| Err(GatewayError::NotFound("message".into())));
        gateway.expect_send_private_notice().returning(|_, _| Ok(()));

        let engine = engine(gateway, spam_defaults());
        let ProcessOutcome::Sanctioned(report) = engine.process_message(&message("spam")).await else {
            panic!("expected a sanction");
        };
        assert!(!report.message_deleted);
        assert_eq!(engine.stats().realtime_stats(test_guild_id()).messages_deleted, 0);
    }

    #[tokio::test]
    async fn test_skips() {
        let engine = engine(MockModerationGateway::new(), spam_defaults());

        let mut bot = message("spam");
        bot.author_is_bot = true;
        assert_eq!(
            engine.process_message(&bot).await,
            ProcessOutcome::NotProcessed(SkipReason::BotAuthor)
        );

        let mut direct = message("spam");
        direct.guild_id = None;
        assert_eq!(
            engine.process_message(&direct).await,
            ProcessOutcome::NotProcessed(SkipReason::NoGuild)
        );

        assert_eq!(
            engine.process_message(&message("hello")).await,
            ProcessOutcome::NotProcessed(SkipReason::NoMatch)
        );
    }
}
