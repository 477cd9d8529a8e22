//! Test utilities and shared test helpers for Warden.
//!
//! Fixtures and helpers shared by the unit and integration tests of every
//! crate in the workspace. Enabled with the `testing` feature.

use crate::{ChannelId, GuildId, MessageId, UserId};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests. Safe to call from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));

        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(filter)
            .try_init();
    });
}

/// Test fixture for creating a fixed timestamp.
pub fn mock_timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .unwrap()
}

/// Create a temporary directory for tests that automatically cleans up.
#[cfg(feature = "tempfile")]
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Discord-related test identifiers.
pub mod discord_fixtures {
    use super::*;

    /// A guild used across tests.
    pub const fn test_guild_id() -> GuildId {
        GuildId(111_111_111_111_111_111)
    }

    /// A channel inside [`test_guild_id`].
    pub const fn test_channel_id() -> ChannelId {
        ChannelId(123_456_789_012_345_678)
    }

    /// A regular member.
    pub const fn test_user_id() -> UserId {
        UserId(987_654_321_098_765_432)
    }

    /// An acting administrator.
    pub const fn test_admin_id() -> UserId {
        UserId(555_555_555_555_555_555)
    }

    /// A message id derived from a sequence number.
    pub const fn test_message_id(seq: u64) -> MessageId {
        MessageId(900_000_000_000_000_000 + seq)
    }

    /// Multiple distinct user ids.
    pub fn test_user_ids(count: usize) -> Vec<UserId> {
        (0..count as u64)
            .map(|i| UserId(100_000_000_000_000_000 + i))
            .collect()
    }
}
