//! Default values.

use crate::schema::*;
use std::collections::HashMap;

/// Cooldown applied when neither the command nor the configuration sets one.
pub const DEFAULT_COOLDOWN_MS: u64 = 3_000;

/// TTL of every resolution cache.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            dev_guild_id: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            url: "sqlite://warden.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            default_cooldown_ms: DEFAULT_COOLDOWN_MS,
            cooldown_overrides: HashMap::new(),
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            admin_ids: Vec::new(),
        }
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            warning: "Warning from {guild}: your message contained a blocked word ({keywords}). \
                      This is offense #{count}."
                .to_string(),
            timeout: "You have been timed out in {guild} for {duration} after offense #{count}."
                .to_string(),
            kick: "You have been kicked from {guild} after offense #{count}. You may rejoin."
                .to_string(),
            ban: "You have been banned from {guild} after offense #{count}.".to_string(),
        }
    }
}

impl Default for ModerationDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: Vec::new(),
            case_sensitive: false,
            escalation_enabled: true,
            warning_threshold: 3,
            timeout_threshold: 2,
            kick_threshold: 2,
            timeout_duration_secs: 600,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            templates: MessageTemplates::default(),
        }
    }
}
