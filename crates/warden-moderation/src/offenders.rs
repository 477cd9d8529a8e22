//! Per-member offense ledger.

use crate::escalation::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use warden_common::{GuildId, UserId};
use warden_store::schema::MODERATION_OFFENDERS;
use warden_store::{id_value, Conditions, Row, RowExt, Store, StoreError, StoreResult};

/// Running offense record of one member in one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenderRecord {
    /// Row id, once stored.
    pub id: Option<i64>,
    /// Offender.
    pub user_id: UserId,
    /// Guild the offenses happened in.
    pub guild_id: GuildId,
    /// Number of violations so far. Never decremented.
    pub offense_count: u32,
    /// Most recent sanction, `None` before the first violation.
    pub escalation_level: Option<Action>,
    /// Whether a ban has been applied.
    pub is_banned: bool,
    /// Time of the latest violation.
    pub last_offense_at: Option<DateTime<Utc>>,
    /// Creation time of the record.
    pub created_at: DateTime<Utc>,
}

impl OffenderRecord {
    /// A clean record.
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self {
            id: None,
            user_id,
            guild_id,
            offense_count: 0,
            escalation_level: None,
            is_banned: false,
            last_offense_at: None,
            created_at: Utc::now(),
        }
    }

    /// Decodes a `moderation_offenders` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let escalation_level = match row.get_opt_str("escalation_level") {
            None | Some("none") => None,
            Some(level) => Some(
                level
                    .parse()
                    .map_err(|e: String| StoreError::decode("escalation_level", e))?,
            ),
        };
        Ok(Self {
            id: row.get_i64("id").ok(),
            user_id: row.get_id("user_id")?,
            guild_id: row.get_id("guild_id")?,
            offense_count: u32::try_from(row.get_i64_or_zero("offense_count"))
                .map_err(|_| StoreError::decode("offense_count", "out of range"))?,
            escalation_level,
            is_banned: row.get_bool("is_banned").unwrap_or(false),
            last_offense_at: row.get_opt_datetime("last_offense_at")?,
            created_at: row.get_datetime("created_at")?,
        })
    }

    /// Encodes the record as a `moderation_offenders` row, without the id.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), id_value(self.user_id));
        row.insert("guild_id".into(), id_value(self.guild_id));
        row.insert("offense_count".into(), Value::from(self.offense_count));
        row.insert(
            "escalation_level".into(),
            Value::from(self.escalation_level.map_or("none", Action::as_str)),
        );
        row.insert("is_banned".into(), Value::from(self.is_banned));
        row.insert(
            "last_offense_at".into(),
            self.last_offense_at
                .map_or(Value::Null, |at| Value::from(at.to_rfc3339())),
        );
        row.insert("created_at".into(), Value::from(self.created_at.to_rfc3339()));
        row
    }
}

/// Reads and writes offender records.
#[derive(Clone)]
pub struct OffenderRepository {
    store: Arc<dyn Store>,
}

impl OffenderRepository {
    /// Wraps a store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn key(guild_id: GuildId, user_id: UserId) -> Conditions {
        Conditions::new()
            .eq("user_id", id_value(user_id))
            .eq("guild_id", id_value(guild_id))
    }

    /// The record of `user_id` in `guild_id`, if one exists.
    pub async fn find(&self, guild_id: GuildId, user_id: UserId) -> StoreResult<Option<OffenderRecord>> {
        self.store
            .select_one(MODERATION_OFFENDERS, &Self::key(guild_id, user_id))
            .await?
            .as_ref()
            .map(OffenderRecord::from_row)
            .transpose()
    }

    /// The record of `user_id` in `guild_id`, created on first violation.
    ///
    /// When another writer created the row first, the insert is rejected by
    /// the unique key and that row is returned instead.
    pub async fn fetch_or_create(&self, guild_id: GuildId, user_id: UserId) -> StoreResult<OffenderRecord> {
        if let Some(record) = self.find(guild_id, user_id).await? {
            return Ok(record);
        }
        let mut record = OffenderRecord::new(guild_id, user_id);
        match self.store.insert(MODERATION_OFFENDERS, record.to_row()).await {
            Ok(id) => {
                record.id = Some(id);
                debug!(%guild_id, %user_id, "Created offender record");
                Ok(record)
            }
            Err(e) => match self.find(guild_id, user_id).await? {
                Some(existing) => {
                    debug!(%guild_id, %user_id, "Offender record created concurrently");
                    Ok(existing)
                }
                None => Err(e),
            },
        }
    }

    /// Persists `record`, which must come from [`fetch_or_create`](Self::fetch_or_create).
    pub async fn save(&self, record: &OffenderRecord) -> StoreResult<()> {
        let id = record
            .id
            .ok_or_else(|| StoreError::decode("id", "offender record was never stored"))?;
        self.store.update(MODERATION_OFFENDERS, record.to_row(), id).await?;
        Ok(())
    }
}

impl std::fmt::Debug for OffenderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffenderRepository").finish_non_exhaustive()
    }
}
