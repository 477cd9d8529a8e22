//! Runtime validation of loaded configuration.

use crate::schema::{Config, StoreBackend};
use std::time::Duration;
use warden_common::{Result, WardenError};

/// Longest timeout Discord accepts.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);

/// Longest cooldown accepted for any command.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

impl Config {
    /// Checks the configuration for values the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(WardenError::validation_field(
                "Discord token cannot be empty",
                "discord.token",
            ));
        }

        if self.database.backend == StoreBackend::Sqlite && self.database.url.trim().is_empty() {
            return Err(WardenError::validation_field(
                "Database URL cannot be empty",
                "database.url",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(WardenError::validation_field(
                "At least one database connection is required",
                "database.max_connections",
            ));
        }

        if self.permissions.cache_ttl_secs == 0 {
            return Err(WardenError::validation_field(
                "Cache TTL must be positive",
                "permissions.cache_ttl_secs",
            ));
        }

        let moderation = &self.moderation;
        if moderation.cache_ttl_secs == 0 {
            return Err(WardenError::validation_field(
                "Cache TTL must be positive",
                "moderation.cache_ttl_secs",
            ));
        }

        let timeout = Duration::from_secs(moderation.timeout_duration_secs);
        if timeout.is_zero() || timeout > MAX_TIMEOUT {
            return Err(WardenError::validation_field(
                "Timeout duration must be between 1 second and 28 days",
                "moderation.timeout_duration_secs",
            ));
        }

        if moderation.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(WardenError::validation_field(
                "Keywords cannot be blank",
                "moderation.keywords",
            ));
        }

        let max_ms = MAX_COOLDOWN.as_millis();
        if u128::from(self.commands.default_cooldown_ms) > max_ms {
            return Err(WardenError::validation_field(
                "Default cooldown cannot exceed one day",
                "commands.default_cooldown_ms",
            ));
        }
        if let Some((name, _)) = self
            .commands
            .cooldown_overrides
            .iter()
            .find(|(_, ms)| u128::from(**ms) > max_ms)
        {
            return Err(WardenError::validation_field(
                format!("Cooldown for '{name}' cannot exceed one day"),
                "commands.cooldown_overrides",
            ));
        }

        Ok(())
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a configuration.
    pub fn validate(config: &Config) -> Result<()> {
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.discord.token = "token".to_string();
        config
    }

    #[test]
    fn test_default_requires_token() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = valid();
        config.moderation.timeout_duration_secs = 0;
        assert!(config.validate().is_err());

        config.moderation.timeout_duration_secs = MAX_TIMEOUT.as_secs();
        assert!(config.validate().is_ok());

        config.moderation.timeout_duration_secs = MAX_TIMEOUT.as_secs() + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_keyword_rejected() {
        let mut config = valid();
        config.moderation.keywords = vec!["spam".into(), "  ".into()];
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_cooldown_override_limit() {
        let mut config = valid();
        config
            .commands
            .cooldown_overrides
            .insert("modstats".into(), MAX_COOLDOWN.as_millis() as u64 + 1);
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_memory_backend_ignores_url() {
        let mut config = valid();
        config.database.backend = StoreBackend::Memory;
        config.database.url.clear();
        assert!(config.validate().is_ok());
    }
}
