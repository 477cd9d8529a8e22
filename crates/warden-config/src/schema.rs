//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use warden_common::LoggingConfig;

/// Main configuration structure for Warden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord configuration.
    pub discord: DiscordConfig,
    /// Store configuration.
    pub database: DatabaseConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Command dispatch configuration.
    pub commands: CommandsConfig,
    /// Permission resolution configuration and seed data.
    pub permissions: PermissionsConfig,
    /// Defaults applied to guilds without a stored moderation configuration.
    pub moderation: ModerationDefaults,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Discord bot token.
    pub token: String,
    /// Register commands in this guild only (fast propagation during development).
    pub dev_guild_id: Option<u64>,
}

/// Which store implementation backs the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database at [`DatabaseConfig::url`].
    Sqlite,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend selection.
    pub backend: StoreBackend,
    /// Connection URL, e.g. `sqlite://warden.db`.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

/// Command dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Cooldown applied to commands that do not declare one, in milliseconds.
    pub default_cooldown_ms: u64,
    /// Per-command cooldown overrides in milliseconds, keyed by command name.
    pub cooldown_overrides: HashMap<String, u64>,
}

impl CommandsConfig {
    /// Effective cooldown override for `command`, if configured.
    pub fn cooldown_for(&self, command: &str) -> Option<Duration> {
        self.cooldown_overrides
            .get(command)
            .map(|ms| Duration::from_millis(*ms))
    }
}

/// Permission resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// TTL of permission and role caches, in seconds.
    pub cache_ttl_secs: u64,
    /// Identities granted the admin role at startup.
    pub admin_ids: Vec<u64>,
}

impl PermissionsConfig {
    /// Cache TTL as a [`Duration`].
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Notice templates sent with each sanction.
///
/// Placeholders: `{user}`, `{guild}`, `{count}`, `{keywords}`, `{duration}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    /// Private notice for a warning.
    pub warning: String,
    /// Private notice for a timeout.
    pub timeout: String,
    /// Private notice for a kick.
    pub kick: String,
    /// Private notice for a ban.
    pub ban: String,
}

/// Default moderation policy for guilds without a stored configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationDefaults {
    /// Whether keyword moderation runs.
    pub enabled: bool,
    /// Blocked keywords.
    pub keywords: Vec<String>,
    /// Whether keyword matching is case sensitive.
    pub case_sensitive: bool,
    /// When false every violation is a warning.
    pub escalation_enabled: bool,
    /// Number of offenses answered with a warning.
    pub warning_threshold: u32,
    /// Number of offenses answered with a timeout after the warnings.
    pub timeout_threshold: u32,
    /// Width of the kick band after the timeouts; ban starts at warning + timeout + kick.
    pub kick_threshold: u32,
    /// Timeout length in seconds.
    pub timeout_duration_secs: u64,
    /// TTL of configuration and whitelist caches, in seconds.
    pub cache_ttl_secs: u64,
    /// Notice templates.
    pub templates: MessageTemplates,
}

impl ModerationDefaults {
    /// Cache TTL as a [`Duration`].
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
