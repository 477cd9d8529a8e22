//! Configuration loading utilities

use crate::schema::{Config, StoreBackend};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use warden_common::WardenError;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Unknown file extension
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// Environment variable parsing error
    #[error("Failed to parse environment variable '{var}': {source}")]
    EnvParseError {
        /// Variable name
        var: String,
        /// Parse failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

impl From<ConfigError> for WardenError {
    fn from(err: ConfigError) -> Self {
        WardenError::config_with_source("Failed to load configuration", err)
    }
}

/// Files probed, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["config.yaml", "config.yml", "config.toml"];

/// Configuration loader for the application
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML or TOML file with environment variable overrides
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(path, &content)?;

        Self::apply_env_overrides(&mut config)?;
        config.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from `WARDEN_CONFIG_PATH`, a default file, or defaults
    pub fn load() -> Result<Config, ConfigError> {
        if let Ok(config_path) = env::var("WARDEN_CONFIG_PATH") {
            return Self::load_config(config_path);
        }

        if let Some(path) = DEFAULT_CONFIG_FILES
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            return Self::load_config(path);
        }

        debug!("No configuration file found, using defaults with environment overrides");
        let mut config = Config::default();
        Self::apply_env_overrides(&mut config)?;
        config.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// Parse configuration text according to the file extension
    pub fn parse(path: &Path, content: &str) -> Result<Config, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(content)?),
            Some("toml") => Ok(toml::from_str(content)?),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            config.discord.token = token;
        }

        if let Ok(guild) = env::var("DISCORD_DEV_GUILD_ID") {
            config.discord.dev_guild_id = Some(parse_env("DISCORD_DEV_GUILD_ID", &guild)?);
        }

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.backend = if url == "memory" {
                StoreBackend::Memory
            } else {
                StoreBackend::Sqlite
            };
            config.database.url = url;
        }

        if let Ok(level) = env::var("WARDEN_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(ids) = env::var("WARDEN_ADMIN_IDS") {
            config.permissions.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env("WARDEN_ADMIN_IDS", s))
                .collect::<Result<_, _>>()?;
        }

        if let Ok(cooldown) = env::var("WARDEN_DEFAULT_COOLDOWN_MS") {
            config.commands.default_cooldown_ms = parse_env("WARDEN_DEFAULT_COOLDOWN_MS", &cooldown)?;
        }

        Ok(())
    }
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::EnvParseError {
        var: var.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
discord:
  token: abc
commands:
  default_cooldown_ms: 5000
  cooldown_overrides:
    modstats: 10000
moderation:
  keywords: ["spam", "scam"]
  warning_threshold: 1
"#;
        let config = ConfigLoader::parse(Path::new("config.yaml"), yaml).unwrap();
        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.commands.default_cooldown_ms, 5000);
        assert_eq!(
            config.commands.cooldown_for("modstats"),
            Some(std::time::Duration::from_secs(10))
        );
        assert_eq!(config.moderation.keywords, vec!["spam", "scam"]);
        assert_eq!(config.moderation.warning_threshold, 1);
        assert_eq!(config.moderation.timeout_threshold, 2);
    }

    #[test]
    fn test_parse_toml() {
        let toml_text = r#"
[discord]
token = "xyz"

[database]
backend = "memory"

[permissions]
admin_ids = [1, 2]
"#;
        let config = ConfigLoader::parse(Path::new("config.toml"), toml_text).unwrap();
        assert_eq!(config.discord.token, "xyz");
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.permissions.admin_ids, vec![1, 2]);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ConfigLoader::parse(Path::new("config.ini"), "");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"));
    }

    #[test]
    fn test_parse_env_reports_variable() {
        let err = parse_env::<u64>("WARDEN_ADMIN_IDS", "abc").unwrap_err();
        assert!(err.to_string().contains("WARDEN_ADMIN_IDS"));
    }
}
