//! Per-guild moderation configuration.

use crate::error::{ModerationError, ModerationResult};
use crate::escalation::Thresholds;
use crate::keywords::KeywordMatcher;
use crate::locks::KeyedLocks;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use warden_common::{GuildId, TtlCache};
use warden_config::validator::MAX_TIMEOUT;
use warden_config::{MessageTemplates, ModerationDefaults};
use warden_store::schema::MODERATION_CONFIG;
use warden_store::{id_value, Conditions, Row, RowExt, Store, StoreError, StoreResult};

/// Moderation policy of one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildModerationConfig {
    /// Row id, once stored.
    pub id: Option<i64>,
    /// Guild the policy applies to.
    pub guild_id: GuildId,
    /// Whether messages are scanned at all.
    pub enabled: bool,
    /// Blocked keywords.
    pub keywords: Vec<String>,
    /// Whether keyword matching is case sensitive.
    pub case_sensitive: bool,
    /// When false every violation is a warning.
    pub escalation_enabled: bool,
    /// Band widths.
    pub thresholds: Thresholds,
    /// Length of a timeout sanction.
    pub timeout_duration: Duration,
    /// Notice templates.
    pub templates: MessageTemplates,
}

impl GuildModerationConfig {
    /// The policy a guild starts with.
    pub fn from_defaults(guild_id: GuildId, defaults: &ModerationDefaults) -> Self {
        Self {
            id: None,
            guild_id,
            enabled: defaults.enabled,
            keywords: defaults.keywords.clone(),
            case_sensitive: defaults.case_sensitive,
            escalation_enabled: defaults.escalation_enabled,
            thresholds: Thresholds {
                warning: defaults.warning_threshold,
                timeout: defaults.timeout_threshold,
                kick: defaults.kick_threshold,
            },
            timeout_duration: Duration::from_secs(defaults.timeout_duration_secs),
            templates: defaults.templates.clone(),
        }
    }

    /// Keyword matcher for this policy.
    pub fn matcher(&self) -> KeywordMatcher {
        KeywordMatcher::new(&self.keywords, self.case_sensitive)
    }

    /// Rejects settings the engine cannot act on.
    pub fn validate(&self) -> ModerationResult<()> {
        if self.timeout_duration.is_zero() || self.timeout_duration > MAX_TIMEOUT {
            return Err(ModerationError::validation(
                "timeout_duration",
                "must be between 1 second and 28 days",
            ));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ModerationError::validation("keywords", "keywords cannot be blank"));
        }
        Ok(())
    }

    /// Decodes a `moderation_config` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let templates = match row.get("templates") {
            Some(Value::String(text)) => serde_json::from_str(text)
                .map_err(|e| StoreError::decode("templates", e.to_string()))?,
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map_err(|e| StoreError::decode("templates", e.to_string()))?,
            _ => MessageTemplates::default(),
        };
        let threshold = |column: &str| -> StoreResult<u32> {
            u32::try_from(row.get_i64(column)?)
                .map_err(|_| StoreError::decode(column, "out of range"))
        };

        Ok(Self {
            id: row.get_i64("id").ok(),
            guild_id: row.get_id("guild_id")?,
            enabled: row.get_bool("enabled")?,
            keywords: row.get_string_list("keywords")?,
            case_sensitive: row.get_bool("case_sensitive")?,
            escalation_enabled: row.get_bool("escalation_enabled")?,
            thresholds: Thresholds {
                warning: threshold("warning_threshold")?,
                timeout: threshold("timeout_threshold")?,
                kick: threshold("kick_threshold")?,
            },
            timeout_duration: Duration::from_secs(
                u64::try_from(row.get_i64("timeout_duration_secs")?)
                    .map_err(|_| StoreError::decode("timeout_duration_secs", "negative"))?,
            ),
            templates,
        })
    }

    /// Encodes the policy as a `moderation_config` row, without the id.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("guild_id".into(), id_value(self.guild_id));
        row.insert("enabled".into(), Value::from(self.enabled));
        row.insert(
            "keywords".into(),
            Value::from(Value::from(self.keywords.clone()).to_string()),
        );
        row.insert("case_sensitive".into(), Value::from(self.case_sensitive));
        row.insert("escalation_enabled".into(), Value::from(self.escalation_enabled));
        row.insert("warning_threshold".into(), Value::from(self.thresholds.warning));
        row.insert("timeout_threshold".into(), Value::from(self.thresholds.timeout));
        row.insert("kick_threshold".into(), Value::from(self.thresholds.kick));
        row.insert(
            "timeout_duration_secs".into(),
            Value::from(self.timeout_duration.as_secs()),
        );
        row.insert(
            "templates".into(),
            Value::from(serde_json::to_string(&self.templates).unwrap_or_default()),
        );
        row.insert("updated_at".into(), Value::from(Utc::now().to_rfc3339()));
        row
    }
}

/// Loads, caches and persists guild policies.
pub struct ModerationConfigStore {
    store: Arc<dyn Store>,
    defaults: ModerationDefaults,
    cache: TtlCache<GuildId, Arc<GuildModerationConfig>>,
    creating: KeyedLocks<GuildId>,
}

impl ModerationConfigStore {
    /// Creates the store; new guilds start from `defaults`.
    pub fn new(store: Arc<dyn Store>, defaults: ModerationDefaults) -> Self {
        let cache = TtlCache::new("moderation_config", defaults.cache_ttl());
        Self {
            store,
            defaults,
            cache,
            creating: KeyedLocks::new(),
        }
    }

    /// Policy of `guild_id`, creating the default row on first access.
    pub async fn get(&self, guild_id: GuildId) -> StoreResult<Arc<GuildModerationConfig>> {
        if let Some(config) = self.cache.get(&guild_id).await {
            return Ok(config);
        }

        let config = match self.load(guild_id).await? {
            Some(config) => config,
            None => self.create_default(guild_id).await?,
        };

        let config = Arc::new(config);
        self.cache.insert(guild_id, Arc::clone(&config)).await;
        debug!(%guild_id, "Cached moderation configuration");
        Ok(config)
    }

    async fn load(&self, guild_id: GuildId) -> StoreResult<Option<GuildModerationConfig>> {
        let key = Conditions::new().eq("guild_id", id_value(guild_id));
        self.store
            .select_one(MODERATION_CONFIG, &key)
            .await?
            .as_ref()
            .map(GuildModerationConfig::from_row)
            .transpose()
    }

    /// Inserts the default row unless a concurrent caller already did.
    async fn create_default(&self, guild_id: GuildId) -> StoreResult<GuildModerationConfig> {
        let _creating = self.creating.lock(guild_id).await;
        if let Some(config) = self.load(guild_id).await? {
            return Ok(config);
        }

        let mut config = GuildModerationConfig::from_defaults(guild_id, &self.defaults);
        match self.store.insert(MODERATION_CONFIG, config.to_row()).await {
            Ok(id) => {
                config.id = Some(id);
                info!(%guild_id, "Created default moderation configuration");
                Ok(config)
            }
            // Another process won the unique guild_id key
            Err(e) => self.load(guild_id).await?.ok_or(e),
        }
    }

    /// Applies `change` to the stored policy and persists it.
    pub async fn update<F>(&self, guild_id: GuildId, change: F) -> ModerationResult<Arc<GuildModerationConfig>>
    where
        F: FnOnce(&mut GuildModerationConfig),
    {
        let current = self.get(guild_id).await?;
        let mut updated = (*current).clone();
        change(&mut updated);
        updated.validate()?;

        let id = updated
            .id
            .ok_or_else(|| StoreError::decode("id", "configuration row has no id"))?;
        self.store.update(MODERATION_CONFIG, updated.to_row(), id).await?;
        self.cache.invalidate(&guild_id).await;
        info!(%guild_id, "Updated moderation configuration");
        Ok(Arc::new(updated))
    }

    /// Adds `keyword` unless already present. Returns whether it was added.
    pub async fn add_keyword(&self, guild_id: GuildId, keyword: &str) -> ModerationResult<bool> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ModerationError::validation("keyword", "keyword cannot be blank"));
        }
        let current = self.get(guild_id).await?;
        if current.keywords.iter().any(|k| k == keyword) {
            return Ok(false);
        }
        self.update(guild_id, |config| config.keywords.push(keyword.to_string()))
            .await?;
        Ok(true)
    }

    /// Removes `keyword`. Returns whether it was present.
    pub async fn remove_keyword(&self, guild_id: GuildId, keyword: &str) -> ModerationResult<bool> {
        let keyword = keyword.trim();
        let current = self.get(guild_id).await?;
        if !current.keywords.iter().any(|k| k == keyword) {
            return Ok(false);
        }
        self.update(guild_id, |config| config.keywords.retain(|k| k != keyword))
            .await?;
        Ok(true)
    }

    /// Drops the cached policy of `guild_id`.
    pub async fn invalidate(&self, guild_id: GuildId) {
        self.cache.invalidate(&guild_id).await;
    }
}

impl std::fmt::Debug for ModerationConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationConfigStore")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::test_utils::discord_fixtures::test_guild_id;
    use warden_store::MemoryStore;

    fn config_store() -> (Arc<MemoryStore>, ModerationConfigStore) {
        let store = Arc::new(MemoryStore::new());
        let defaults = ModerationDefaults {
            keywords: vec!["spam".into()],
            ..ModerationDefaults::default()
        };
        (store.clone(), ModerationConfigStore::new(store, defaults))
    }

    #[tokio::test]
    async fn test_default_row_created_once() {
        let (store, configs) = config_store();
        let guild = test_guild_id();

        let config = configs.get(guild).await.unwrap();
        assert_eq!(config.keywords, vec!["spam"]);
        assert_eq!(config.thresholds.warning, 3);
        configs.invalidate(guild).await;
        configs.get(guild).await.unwrap();

        assert_eq!(store.row_count(MODERATION_CONFIG), 1);
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let (_store, configs) = config_store();
        let guild = test_guild_id();
        configs.get(guild).await.unwrap();

        assert!(configs.add_keyword(guild, "scam").await.unwrap());
        assert!(!configs.add_keyword(guild, "scam").await.unwrap());
        assert_eq!(configs.get(guild).await.unwrap().keywords, vec!["spam", "scam"]);

        assert!(configs.remove_keyword(guild, "spam").await.unwrap());
        assert_eq!(configs.get(guild).await.unwrap().keywords, vec!["scam"]);
    }

    #[tokio::test]
    async fn test_invalid_update_rejected() {
        let (_store, configs) = config_store();
        let guild = test_guild_id();
        let result = configs
            .update(guild, |c| c.timeout_duration = Duration::ZERO)
            .await;
        assert!(matches!(result, Err(ModerationError::Validation { .. })));
        assert_eq!(
            configs.get(guild).await.unwrap().timeout_duration,
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_row_roundtrip() {
        let config = GuildModerationConfig::from_defaults(GuildId(9), &ModerationDefaults::default());
        let decoded = GuildModerationConfig::from_row(&config.to_row()).unwrap();
        assert_eq!(decoded.templates, config.templates);
        assert_eq!(decoded.thresholds, config.thresholds);
        assert_eq!(decoded.timeout_duration, config.timeout_duration);
    }
}
