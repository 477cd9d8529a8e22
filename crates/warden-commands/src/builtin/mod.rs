//! Built-in command set.

pub mod admin;
pub mod general;
pub mod moderation;

use crate::error::{CommandError, CommandResult};
use crate::handler::CommandSource;
use crate::registry::CategoryIndex;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Instant;
use warden_moderation::ModerationEngine;
use warden_permissions::PermissionResolver;

/// Collaborators injected into the built-in handlers.
#[derive(Debug, Clone)]
pub struct BuiltinServices {
    /// Permission resolver, for the admin commands.
    pub resolver: Arc<PermissionResolver>,
    /// Moderation engine, for the moderation commands.
    pub moderation: Arc<ModerationEngine>,
    /// Process start, for `uptime`.
    pub started_at: Instant,
    /// Category index, for `help`.
    pub index: CategoryIndex,
}

/// The `general`, `admin` and `moderation` command sources.
pub fn builtin_sources(services: &BuiltinServices) -> Vec<CommandSource> {
    vec![
        general::source(services),
        admin::source(services),
        moderation::source(services),
    ]
}

/// Expiry `days` from now; `None` when no duration was given.
fn expiry_in_days(days: Option<i64>) -> CommandResult<Option<DateTime<Utc>>> {
    match days {
        None => Ok(None),
        Some(days) if (1..=3650).contains(&days) => Ok(Some(Utc::now() + ChronoDuration::days(days))),
        Some(_) => Err(CommandError::validation("Option `days` must be between 1 and 3650")),
    }
}

fn describe_expiry(expires_at: Option<DateTime<Utc>>) -> String {
    expires_at.map_or_else(
        || "never".to_string(),
        |at| format!("<t:{}:R>", at.timestamp()),
    )
}
