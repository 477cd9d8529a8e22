//! Time-bounded moderation exemptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use warden_common::{GuildId, TtlCache, UserId};
use warden_store::schema::MODERATION_WHITELIST;
use warden_store::{
    id_value, Conditions, Row, RowExt, SelectOptions, SortOrder, Store, StoreResult,
};

/// One exemption of a member from keyword moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Row id, once stored.
    pub id: Option<i64>,
    /// Guild the exemption applies in.
    pub guild_id: GuildId,
    /// Exempted member.
    pub user_id: UserId,
    /// Why the member is exempt.
    pub reason: Option<String>,
    /// Who added the entry.
    pub added_by: UserId,
    /// When it was added.
    pub added_at: DateTime<Utc>,
    /// Optional end of the exemption.
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared on removal or expiry; entries are never deleted.
    pub is_active: bool,
}

impl WhitelistEntry {
    /// Active and not expired at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |at| at > now)
    }

    /// Decodes a `moderation_whitelist` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: row.get_i64("id").ok(),
            guild_id: row.get_id("guild_id")?,
            user_id: row.get_id("user_id")?,
            reason: row.get_opt_str("reason").map(str::to_string),
            added_by: row.get_id("added_by")?,
            added_at: row.get_datetime("added_at")?,
            expires_at: row.get_opt_datetime("expires_at")?,
            is_active: row.get_bool("is_active")?,
        })
    }

    /// Encodes the entry as a `moderation_whitelist` row, without the id.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("guild_id".into(), id_value(self.guild_id));
        row.insert("user_id".into(), id_value(self.user_id));
        row.insert(
            "reason".into(),
            self.reason.clone().map_or(Value::Null, Value::from),
        );
        row.insert("added_by".into(), id_value(self.added_by));
        row.insert("added_at".into(), Value::from(self.added_at.to_rfc3339()));
        row.insert(
            "expires_at".into(),
            self.expires_at
                .map_or(Value::Null, |at| Value::from(at.to_rfc3339())),
        );
        row.insert("is_active".into(), Value::from(self.is_active));
        row
    }
}

/// Whitelist lookups and management for every guild.
pub struct Whitelist {
    store: Arc<dyn Store>,
    // Negative lookups are cached too
    cache: TtlCache<(GuildId, UserId), Option<Arc<WhitelistEntry>>>,
}

impl Whitelist {
    /// Creates the whitelist with cache entries living for `ttl`.
    pub fn new(store: Arc<dyn Store>, ttl: std::time::Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new("whitelist", ttl),
        }
    }

    fn key(guild_id: GuildId, user_id: UserId) -> Conditions {
        Conditions::new()
            .eq("guild_id", id_value(guild_id))
            .eq("user_id", id_value(user_id))
            .eq("is_active", true)
    }

    /// The effectively active entry for `user_id` in `guild_id`, if any.
    ///
    /// Expired entries found on the way are deactivated.
    pub async fn active_entry(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> StoreResult<Option<Arc<WhitelistEntry>>> {
        let now = Utc::now();
        let cache_key = (guild_id, user_id);

        if let Some(cached) = self.cache.get(&cache_key).await {
            match cached {
                Some(entry) if !entry.is_effective(now) => {
                    self.deactivate(&entry).await?;
                    self.cache.insert(cache_key, None).await;
                    return Ok(None);
                }
                other => return Ok(other),
            }
        }

        let rows = self
            .store
            .select(
                MODERATION_WHITELIST,
                &Self::key(guild_id, user_id),
                &SelectOptions::default().order_by("added_at", SortOrder::Descending),
            )
            .await?;

        let mut found = None;
        for row in &rows {
            let entry = WhitelistEntry::from_row(row)?;
            if entry.is_effective(now) {
                if found.is_none() {
                    found = Some(Arc::new(entry));
                }
            } else {
                self.deactivate(&entry).await?;
            }
        }

        self.cache.insert(cache_key, found.clone()).await;
        Ok(found)
    }

    /// Whether `user_id` is exempt in `guild_id`.
    pub async fn is_whitelisted(&self, guild_id: GuildId, user_id: UserId) -> StoreResult<bool> {
        Ok(self.active_entry(guild_id, user_id).await?.is_some())
    }

    /// Exempts `user_id`, replacing any active entry.
    pub async fn add(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        added_by: UserId,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<WhitelistEntry> {
        self.deactivate_all(guild_id, user_id).await?;

        let mut entry = WhitelistEntry {
            id: None,
            guild_id,
            user_id,
            reason,
            added_by,
            added_at: Utc::now(),
            expires_at,
            is_active: true,
        };
        entry.id = Some(self.store.insert(MODERATION_WHITELIST, entry.to_row()).await?);
        self.cache.invalidate(&(guild_id, user_id)).await;
        info!(%guild_id, %user_id, %added_by, "Added whitelist entry");
        Ok(entry)
    }

    /// Deactivates the active entries of `user_id`. Returns whether any existed.
    pub async fn remove(&self, guild_id: GuildId, user_id: UserId) -> StoreResult<bool> {
        let removed = self.deactivate_all(guild_id, user_id).await?;
        self.cache.invalidate(&(guild_id, user_id)).await;
        if removed > 0 {
            info!(%guild_id, %user_id, "Removed whitelist entry");
        }
        Ok(removed > 0)
    }

    /// Effectively active entries of `guild_id`, newest first.
    pub async fn list_active(&self, guild_id: GuildId) -> StoreResult<Vec<WhitelistEntry>> {
        let now = Utc::now();
        let rows = self
            .store
            .select(
                MODERATION_WHITELIST,
                &Conditions::new()
                    .eq("guild_id", id_value(guild_id))
                    .eq("is_active", true),
                &SelectOptions::default().order_by("added_at", SortOrder::Descending),
            )
            .await?;

        let mut active = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = WhitelistEntry::from_row(row)?;
            if entry.is_effective(now) {
                active.push(entry);
            } else {
                self.deactivate(&entry).await?;
                self.cache.invalidate(&(entry.guild_id, entry.user_id)).await;
            }
        }
        Ok(active)
    }

    async fn deactivate_all(&self, guild_id: GuildId, user_id: UserId) -> StoreResult<usize> {
        let rows = self
            .store
            .select(
                MODERATION_WHITELIST,
                &Self::key(guild_id, user_id),
                &SelectOptions::default(),
            )
            .await?;
        for row in &rows {
            self.deactivate(&WhitelistEntry::from_row(row)?).await?;
        }
        Ok(rows.len())
    }

    async fn deactivate(&self, entry: &WhitelistEntry) -> StoreResult<()> {
        let Some(id) = entry.id else {
            return Ok(());
        };
        let mut row = Row::new();
        row.insert("is_active".into(), Value::from(false));
        self.store.update(MODERATION_WHITELIST, row, id).await?;
        debug!(guild_id = %entry.guild_id, user_id = %entry.user_id, id, "Deactivated whitelist entry");
        Ok(())
    }
}

impl std::fmt::Debug for Whitelist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whitelist")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;
    use warden_common::test_utils::discord_fixtures::*;
    use warden_store::MemoryStore;

    fn whitelist() -> (Arc<MemoryStore>, Whitelist) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Whitelist::new(store, StdDuration::from_secs(300)))
    }

    #[tokio::test]
    async fn test_add_and_remove_keeps_rows() {
        let (store, whitelist) = whitelist();
        let (guild, user) = (test_guild_id(), test_user_id());

        assert!(!whitelist.is_whitelisted(guild, user).await.unwrap());
        whitelist
            .add(guild, user, test_admin_id(), Some("trusted".into()), None)
            .await
            .unwrap();
        assert!(whitelist.is_whitelisted(guild, user).await.unwrap());

        assert!(whitelist.remove(guild, user).await.unwrap());
        assert!(!whitelist.is_whitelisted(guild, user).await.unwrap());
        assert!(!whitelist.remove(guild, user).await.unwrap());

        // Removal deactivates, never deletes
        assert_eq!(store.row_count(MODERATION_WHITELIST), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_deactivated() {
        let (store, whitelist) = whitelist();
        let (guild, user) = (test_guild_id(), test_user_id());
        whitelist
            .add(guild, user, test_admin_id(), None, Some(Utc::now() - Duration::seconds(1)))
            .await
            .unwrap();

        assert!(!whitelist.is_whitelisted(guild, user).await.unwrap());
        let rows = store.rows(MODERATION_WHITELIST);
        assert!(!rows[0].get_bool("is_active").unwrap());
    }

    #[tokio::test]
    async fn test_entries_are_per_guild() {
        let (_store, whitelist) = whitelist();
        let user = test_user_id();
        whitelist
            .add(GuildId(1), user, test_admin_id(), None, None)
            .await
            .unwrap();

        assert!(whitelist.is_whitelisted(GuildId(1), user).await.unwrap());
        assert!(!whitelist.is_whitelisted(GuildId(2), user).await.unwrap());
        assert_eq!(whitelist.list_active(GuildId(1)).await.unwrap().len(), 1);
        assert!(whitelist.list_active(GuildId(2)).await.unwrap().is_empty());
    }
}
