//! Durable and same-day moderation counters.

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_common::GuildId;
use warden_store::schema::MODERATION_DAILY_STATS;
use warden_store::{id_value, Conditions, RowExt, Store, StoreResult};

use crate::escalation::Action;

/// A single counted moderation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatCounter {
    /// A violating message was removed.
    MessagesDeleted,
    /// A warning was issued.
    Warnings,
    /// A timeout was applied.
    Timeouts,
    /// A member was kicked.
    Kicks,
    /// A member was banned.
    Bans,
    /// A whitelisted member's violation was let through.
    WhitelistBypasses,
}

impl StatCounter {
    /// Column of the counter in `moderation_daily_stats`.
    pub const fn column(self) -> &'static str {
        match self {
            Self::MessagesDeleted => "messages_deleted",
            Self::Warnings => "warnings",
            Self::Timeouts => "timeouts",
            Self::Kicks => "kicks",
            Self::Bans => "bans",
            Self::WhitelistBypasses => "whitelist_bypasses",
        }
    }

    /// Counter bumped when `action` is applied.
    pub const fn for_action(action: Action) -> Self {
        match action {
            Action::Warning => Self::Warnings,
            Action::Timeout => Self::Timeouts,
            Action::Kick => Self::Kicks,
            Action::Ban => Self::Bans,
        }
    }
}

/// Counter values for one guild and day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounts {
    /// Messages removed.
    pub messages_deleted: u64,
    /// Warnings issued.
    pub warnings: u64,
    /// Timeouts applied.
    pub timeouts: u64,
    /// Kicks applied.
    pub kicks: u64,
    /// Bans applied.
    pub bans: u64,
    /// Whitelist bypasses.
    pub whitelist_bypasses: u64,
}

impl DailyCounts {
    fn bump(&mut self, counter: StatCounter) {
        let slot = match counter {
            StatCounter::MessagesDeleted => &mut self.messages_deleted,
            StatCounter::Warnings => &mut self.warnings,
            StatCounter::Timeouts => &mut self.timeouts,
            StatCounter::Kicks => &mut self.kicks,
            StatCounter::Bans => &mut self.bans,
            StatCounter::WhitelistBypasses => &mut self.whitelist_bypasses,
        };
        *slot += 1;
    }

    /// Total sanctions of any kind.
    pub const fn total_actions(&self) -> u64 {
        self.warnings + self.timeouts + self.kicks + self.bans
    }
}

/// Same-day counters kept in memory.
///
/// Not authoritative: the durable aggregate is the system of record and
/// these values reset at local midnight.
#[derive(Debug, Default)]
pub struct RealtimeStats {
    counters: DashMap<GuildId, DailyCounts>,
}

impl RealtimeStats {
    /// Empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to `counter` for `guild_id`.
    pub fn increment(&self, guild_id: GuildId, counter: StatCounter) {
        self.counters.entry(guild_id).or_default().bump(counter);
    }

    /// Today's counts for `guild_id`.
    pub fn snapshot(&self, guild_id: GuildId) -> DailyCounts {
        self.counters
            .get(&guild_id)
            .map(|counts| *counts)
            .unwrap_or_default()
    }

    /// Clears every guild's counters.
    pub fn reset(&self) {
        self.counters.clear();
    }
}

/// Key of today's durable row.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Records counters durably and in memory.
#[derive(Clone)]
pub struct StatsRecorder {
    store: Arc<dyn Store>,
    realtime: Arc<RealtimeStats>,
}

impl StatsRecorder {
    /// Creates a recorder over `store`, mirroring into `realtime`.
    pub fn new(store: Arc<dyn Store>, realtime: Arc<RealtimeStats>) -> Self {
        Self { store, realtime }
    }

    /// The in-memory counters.
    pub fn realtime(&self) -> &Arc<RealtimeStats> {
        &self.realtime
    }

    /// Adds one to `counter` for `guild_id`. Store failures are logged only.
    pub async fn record(&self, guild_id: GuildId, counter: StatCounter) {
        self.realtime.increment(guild_id, counter);

        let key = Conditions::new()
            .eq("guild_id", id_value(guild_id))
            .eq("date", date_key(today()));
        if let Err(e) = self
            .store
            .increment(MODERATION_DAILY_STATS, &key, counter.column(), 1)
            .await
        {
            warn!(%guild_id, counter = counter.column(), error = %e, "Failed to persist moderation counter");
        }
    }

    /// Durable counts of `guild_id` on `date`; zero when nothing was recorded.
    pub async fn daily_stats(&self, guild_id: GuildId, date: NaiveDate) -> StoreResult<DailyCounts> {
        let key = Conditions::new()
            .eq("guild_id", id_value(guild_id))
            .eq("date", date_key(date));
        let Some(row) = self.store.select_one(MODERATION_DAILY_STATS, &key).await? else {
            return Ok(DailyCounts::default());
        };

        let read = |column: &str| u64::try_from(row.get_i64_or_zero(column)).unwrap_or(0);
        Ok(DailyCounts {
            messages_deleted: read("messages_deleted"),
            warnings: read("warnings"),
            timeouts: read("timeouts"),
            kicks: read("kicks"),
            bans: read("bans"),
            whitelist_bypasses: read("whitelist_bypasses"),
        })
    }

    /// Today's in-memory counts of `guild_id`.
    pub fn realtime_stats(&self, guild_id: GuildId) -> DailyCounts {
        self.realtime.snapshot(guild_id)
    }
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}

/// Time left until the next local midnight after `now`.
pub fn until_next_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    let next = tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest());
    match next {
        Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
        // No representable midnight (DST gap at 00:00); retry in an hour
        None => Duration::from_secs(3600),
    }
}

/// Resets `realtime` at the next local midnight and every 24 hours after.
pub fn spawn_daily_reset(realtime: Arc<RealtimeStats>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let first = until_next_midnight(Local::now());
        debug!(wait_secs = first.as_secs(), "Scheduled realtime statistics reset");
        tokio::time::sleep(first).await;

        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            // First tick completes immediately
            interval.tick().await;
            realtime.reset();
            info!("Reset realtime moderation statistics");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_store::MemoryStore;

    #[tokio::test]
    async fn test_record_updates_both_views() {
        let store = Arc::new(MemoryStore::new());
        let recorder = StatsRecorder::new(store, Arc::new(RealtimeStats::new()));
        let guild = GuildId(7);

        recorder.record(guild, StatCounter::Warnings).await;
        recorder.record(guild, StatCounter::Warnings).await;
        recorder.record(guild, StatCounter::Bans).await;

        let durable = recorder.daily_stats(guild, today()).await.unwrap();
        assert_eq!(durable.warnings, 2);
        assert_eq!(durable.bans, 1);
        assert_eq!(durable.total_actions(), 3);
        assert_eq!(recorder.realtime_stats(guild), durable);

        recorder.realtime().reset();
        assert_eq!(recorder.realtime_stats(guild), DailyCounts::default());
        // Durable counts survive the reset
        assert_eq!(recorder.daily_stats(guild, today()).await.unwrap().warnings, 2);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_realtime_counts() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let recorder = StatsRecorder::new(store, Arc::new(RealtimeStats::new()));

        recorder.record(GuildId(1), StatCounter::Kicks).await;
        assert_eq!(recorder.realtime_stats(GuildId(1)).kicks, 1);
    }

    #[test]
    fn test_until_next_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        assert_eq!(until_next_midnight(now), Duration::from_secs(3600));

        let midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(until_next_midnight(midnight), Duration::from_secs(86_400));
    }
}
