//! Integration tests for the moderation pipeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use warden_common::test_utils::discord_fixtures::*;
use warden_common::{ChannelId, GuildId, MessageId, UserId};
use warden_config::ModerationDefaults;
use warden_moderation::stats::today;
use warden_moderation::{
    Action, GatewayError, InboundMessage, LogAction, LogOutcome, ModerationEngine,
    ModerationGateway, ProcessOutcome, RealtimeStats, SanctionStatus,
};
use warden_store::schema::{MODERATION_CONFIG, MODERATION_LOGS, MODERATION_OFFENDERS};
use warden_store::{Conditions, MemoryStore, Row, SelectOptions, Store, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Delete(MessageId),
    Notice(UserId),
    Timeout(UserId, Duration),
    Kick(UserId),
    Ban(UserId),
}

#[derive(Default)]
struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    fail_bans: bool,
    slow_notices: bool,
}

impl RecordingGateway {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModerationGateway for RecordingGateway {
    async fn delete_message(&self, _channel: ChannelId, message: MessageId) -> Result<(), GatewayError> {
        self.calls.lock().push(Call::Delete(message));
        Ok(())
    }

    async fn send_private_notice(&self, user: UserId, _content: String) -> Result<(), GatewayError> {
        if self.slow_notices {
            tokio::task::yield_now().await;
        }
        self.calls.lock().push(Call::Notice(user));
        Ok(())
    }

    async fn timeout_member(
        &self,
        _guild: GuildId,
        user: UserId,
        duration: Duration,
        _reason: String,
    ) -> Result<(), GatewayError> {
        self.calls.lock().push(Call::Timeout(user, duration));
        Ok(())
    }

    async fn kick_member(&self, _guild: GuildId, user: UserId, _reason: String) -> Result<(), GatewayError> {
        self.calls.lock().push(Call::Kick(user));
        Ok(())
    }

    async fn ban_member(&self, _guild: GuildId, user: UserId, _reason: String) -> Result<(), GatewayError> {
        if self.fail_bans {
            return Err(GatewayError::Forbidden("ban".into()));
        }
        self.calls.lock().push(Call::Ban(user));
        Ok(())
    }

    async fn can_sanction(&self, _guild: GuildId, _user: UserId, _action: Action) -> bool {
        true
    }
}

/// Memory store that gives other tasks a turn before every operation.
struct YieldingStore(Arc<MemoryStore>);

#[async_trait]
impl Store for YieldingStore {
    async fn select(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &SelectOptions,
    ) -> StoreResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.0.select(table, conditions, options).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<i64> {
        tokio::task::yield_now().await;
        self.0.insert(table, row).await
    }

    async fn update(&self, table: &str, row: Row, id: i64) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        self.0.update(table, row, id).await
    }

    async fn delete(&self, table: &str, conditions: &Conditions) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        self.0.delete(table, conditions).await
    }

    async fn query(&self, sql: &str, params: &[serde_json::Value]) -> StoreResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.0.query(sql, params).await
    }

    async fn increment(
        &self,
        table: &str,
        key: &Conditions,
        column: &str,
        amount: i64,
    ) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.0.increment(table, key, column, amount).await
    }

    fn is_available(&self) -> bool {
        self.0.is_available()
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    gateway: Arc<RecordingGateway>,
    engine: ModerationEngine,
}

fn harness(defaults: ModerationDefaults, gateway: RecordingGateway) -> Harness {
    warden_common::test_utils::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(gateway);
    let engine = ModerationEngine::new(
        store.clone(),
        gateway.clone(),
        defaults,
        Arc::new(RealtimeStats::new()),
    );
    Harness {
        store,
        gateway,
        engine,
    }
}

/// Harness whose store and notices suspend, so concurrent messages interleave.
fn interleaving_harness(defaults: ModerationDefaults) -> Harness {
    warden_common::test_utils::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RecordingGateway {
        slow_notices: true,
        ..RecordingGateway::default()
    });
    let engine = ModerationEngine::new(
        Arc::new(YieldingStore(store.clone())),
        gateway.clone(),
        defaults,
        Arc::new(RealtimeStats::new()),
    );
    Harness {
        store,
        gateway,
        engine,
    }
}

fn scenario_defaults() -> ModerationDefaults {
    ModerationDefaults {
        keywords: vec!["forbidden".into()],
        warning_threshold: 1,
        timeout_threshold: 3,
        kick_threshold: 2,
        timeout_duration_secs: 120,
        ..ModerationDefaults::default()
    }
}

fn violation(seq: u64) -> InboundMessage {
    InboundMessage {
        author_id: test_user_id(),
        author_is_bot: false,
        guild_id: Some(test_guild_id()),
        guild_name: None,
        channel_id: test_channel_id(),
        message_id: test_message_id(seq),
        content: format!("this is Forbidden content #{seq}"),
    }
}

#[tokio::test]
async fn test_escalation_through_every_band() {
    let h = harness(scenario_defaults(), RecordingGateway::default());
    let expected = [
        Action::Warning,
        Action::Timeout,
        Action::Timeout,
        Action::Timeout,
        Action::Kick,
        Action::Ban,
    ];

    for (seq, action) in (1..).zip(expected) {
        match h.engine.process_message(&violation(seq)).await {
            ProcessOutcome::Sanctioned(report) => {
                assert_eq!(report.action, action, "offense {seq}");
                assert_eq!(report.offense_count, seq as u32);
                assert_eq!(report.status, SanctionStatus::Applied);
                assert!(report.message_deleted);
            }
            other => panic!("offense {seq}: unexpected outcome {other:?}"),
        }
    }

    let calls = h.gateway.calls();
    let user = test_user_id();
    assert!(calls.contains(&Call::Timeout(user, Duration::from_secs(120))));
    assert!(calls.contains(&Call::Kick(user)));
    assert!(calls.contains(&Call::Ban(user)));

    let record = h
        .engine
        .offenders()
        .find(test_guild_id(), user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.offense_count, 6);
    assert_eq!(record.escalation_level, Some(Action::Ban));
    assert!(record.is_banned);

    let durable = h
        .engine
        .stats()
        .daily_stats(test_guild_id(), today())
        .await
        .unwrap();
    assert_eq!(durable.messages_deleted, 6);
    assert_eq!(durable.warnings, 1);
    assert_eq!(durable.timeouts, 3);
    assert_eq!(durable.kicks, 1);
    assert_eq!(durable.bans, 1);
    assert_eq!(h.engine.stats().realtime_stats(test_guild_id()), durable);

    // A banned member writing again is not banned twice
    match h.engine.process_message(&violation(7)).await {
        ProcessOutcome::Sanctioned(report) => {
            assert_eq!(report.status, SanctionStatus::AlreadyBanned);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let bans = h.gateway.calls().iter().filter(|c| matches!(c, Call::Ban(_))).count();
    assert_eq!(bans, 1);
}

#[tokio::test]
async fn test_whitelist_bypass_is_logged_not_sanctioned() {
    let h = harness(scenario_defaults(), RecordingGateway::default());
    let (guild, user) = (test_guild_id(), test_user_id());
    h.engine
        .whitelist()
        .add(guild, user, test_admin_id(), Some("trusted".into()), None)
        .await
        .unwrap();

    let outcome = h.engine.process_message(&violation(1)).await;
    assert_eq!(
        outcome,
        ProcessOutcome::WhitelistBypass {
            keywords: vec!["forbidden".into()]
        }
    );

    assert!(h.gateway.calls().is_empty());
    assert_eq!(h.store.row_count(MODERATION_OFFENDERS), 0);
    assert_eq!(h.store.row_count(MODERATION_LOGS), 1);

    let logs = h.engine.logs().recent(guild, user, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, LogAction::WhitelistBypass);

    let durable = h.engine.stats().daily_stats(guild, today()).await.unwrap();
    assert_eq!(durable.whitelist_bypasses, 1);
    assert_eq!(durable.total_actions(), 0);
}

#[tokio::test]
async fn test_disabled_escalation_only_warns() {
    let defaults = ModerationDefaults {
        escalation_enabled: false,
        ..scenario_defaults()
    };
    let h = harness(defaults, RecordingGateway::default());

    for seq in 1..=8 {
        match h.engine.process_message(&violation(seq)).await {
            ProcessOutcome::Sanctioned(report) => assert_eq!(report.action, Action::Warning),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(!h
        .gateway
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Timeout(..) | Call::Kick(_) | Call::Ban(_))));
}

#[tokio::test]
async fn test_failed_ban_is_logged_but_not_counted() {
    let defaults = ModerationDefaults {
        warning_threshold: 0,
        timeout_threshold: 0,
        kick_threshold: 0,
        ..scenario_defaults()
    };
    let gateway = RecordingGateway {
        fail_bans: true,
        ..RecordingGateway::default()
    };
    let h = harness(defaults, gateway);

    match h.engine.process_message(&violation(1)).await {
        ProcessOutcome::Sanctioned(report) => {
            assert_eq!(report.action, Action::Ban);
            assert!(matches!(report.status, SanctionStatus::Failed(_)));
            assert!(!report.notice_sent);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // The member is never told about a ban that did not happen
    assert!(!h.gateway.calls().contains(&Call::Notice(test_user_id())));

    let logs = h
        .engine
        .logs()
        .recent(test_guild_id(), test_user_id(), 10)
        .await
        .unwrap();
    assert_eq!(logs[0].action, LogAction::Sanction(Action::Ban));
    assert_eq!(logs[0].outcome, LogOutcome::Failed);

    let record = h
        .engine
        .offenders()
        .find(test_guild_id(), test_user_id())
        .await
        .unwrap()
        .unwrap();
    assert!(!record.is_banned);
    assert_eq!(h.store.row_count(MODERATION_LOGS), 1);
    assert_eq!(h.engine.stats().realtime_stats(test_guild_id()).bans, 0);
}

#[tokio::test]
async fn test_store_outage_skips_message() {
    let h = harness(scenario_defaults(), RecordingGateway::default());
    h.store.set_available(false);

    let outcome = h.engine.process_message(&violation(1)).await;
    assert!(matches!(outcome, ProcessOutcome::NotProcessed(_)));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_violations_are_all_counted() {
    let defaults = ModerationDefaults {
        warning_threshold: 1,
        timeout_threshold: 1,
        kick_threshold: 2,
        ..scenario_defaults()
    };
    let h = interleaving_harness(defaults);

    let first = h.engine.process_message(&violation(1)).await;
    assert!(matches!(first, ProcessOutcome::Sanctioned(ref r) if r.action == Action::Warning));

    let (msg2, msg3) = (violation(2), violation(3));
    let (second, third) = tokio::join!(
        h.engine.process_message(&msg2),
        h.engine.process_message(&msg3),
    );
    let mut reported: Vec<(u32, Action)> = [second, third]
        .into_iter()
        .map(|outcome| match outcome {
            ProcessOutcome::Sanctioned(report) => (report.offense_count, report.action),
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    reported.sort_by_key(|(count, _)| *count);
    assert_eq!(reported, vec![(2, Action::Timeout), (3, Action::Kick)]);

    let record = h
        .engine
        .offenders()
        .find(test_guild_id(), test_user_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.offense_count, 3);
    assert_eq!(h.store.row_count(MODERATION_OFFENDERS), 1);
}

#[tokio::test]
async fn test_concurrent_first_offenses_share_one_record() {
    let h = interleaving_harness(scenario_defaults());

    let (msg1, msg2) = (violation(1), violation(2));
    let (first, second) = tokio::join!(
        h.engine.process_message(&msg1),
        h.engine.process_message(&msg2),
    );
    assert!(matches!(first, ProcessOutcome::Sanctioned(_)));
    assert!(matches!(second, ProcessOutcome::Sanctioned(_)));

    assert_eq!(h.store.row_count(MODERATION_CONFIG), 1);
    assert_eq!(h.store.row_count(MODERATION_OFFENDERS), 1);
    let record = h
        .engine
        .offenders()
        .find(test_guild_id(), test_user_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.offense_count, 2);
}
