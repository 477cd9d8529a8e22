//! Guild moderation management.

use super::{describe_expiry, expiry_in_days, BuiltinServices};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::handler::{CommandDefinition, CommandHandler, CommandReply, CommandSource};
use crate::options::{OptionKind, OptionSpec};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{format_duration, format_timestamp};
use warden_moderation::stats::today;
use warden_moderation::{DailyCounts, GuildModerationConfig, ModerationEngine};
use warden_permissions::perm;

/// Category name.
pub const CATEGORY: &str = "moderation";

/// Log entries shown by `offender`.
const RECENT_LOG_LIMIT: usize = 5;

pub(super) fn source(services: &BuiltinServices) -> CommandSource {
    let engine = &services.moderation;
    let user = || OptionSpec::required("user", OptionKind::User, "Target member");
    let keyword = || OptionSpec::required("keyword", OptionKind::String, "Keyword");

    CommandSource::new(
        CATEGORY,
        vec![
            CommandDefinition::new("modconfig")
                .description("Shows the moderation settings of this server")
                .permission(perm::MODERATION_CONFIG)
                .execute(ShowConfig {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("modconfig-set")
                .description("Changes the moderation settings of this server")
                .permission(perm::MODERATION_CONFIG)
                .option(OptionSpec::optional("enabled", OptionKind::Boolean, "Scan messages"))
                .option(OptionSpec::optional("escalation", OptionKind::Boolean, "Escalate repeat offenses"))
                .option(OptionSpec::optional("case_sensitive", OptionKind::Boolean, "Match keywords case sensitively"))
                .option(OptionSpec::optional("warnings", OptionKind::Integer, "Offenses answered with a warning"))
                .option(OptionSpec::optional("timeouts", OptionKind::Integer, "Offenses answered with a timeout"))
                .option(OptionSpec::optional("kicks", OptionKind::Integer, "Width of the kick band"))
                .option(OptionSpec::optional("timeout_minutes", OptionKind::Integer, "Length of a timeout"))
                .execute(SetConfig {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("keyword-add")
                .description("Adds a blocked keyword")
                .permission(perm::MODERATION_CONFIG)
                .option(keyword())
                .execute(AddKeyword {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("keyword-remove")
                .description("Removes a blocked keyword")
                .permission(perm::MODERATION_CONFIG)
                .option(keyword())
                .execute(RemoveKeyword {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("whitelist-add")
                .description("Exempts a member from keyword moderation")
                .permission(perm::MODERATION_WHITELIST)
                .option(user())
                .option(OptionSpec::optional("reason", OptionKind::String, "Why the member is exempt"))
                .option(OptionSpec::optional("days", OptionKind::Integer, "Expire after this many days"))
                .execute(AddWhitelist {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("whitelist-remove")
                .description("Ends a member's exemption")
                .permission(perm::MODERATION_WHITELIST)
                .option(user())
                .execute(RemoveWhitelist {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("whitelist-list")
                .description("Lists exempt members")
                .permission(perm::MODERATION_WHITELIST)
                .execute(ListWhitelist {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("modstats")
                .description("Shows moderation statistics")
                .permission(perm::MODERATION_STATS)
                .option(OptionSpec::optional("date", OptionKind::String, "Day as YYYY-MM-DD, today by default"))
                .execute(ShowStats {
                    engine: Arc::clone(engine),
                }),
            CommandDefinition::new("offender")
                .description("Shows a member's offense record")
                .permission(perm::MODERATION_VIEW_LOGS)
                .option(user())
                .execute(ShowOffender {
                    engine: Arc::clone(engine),
                }),
        ],
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn render_config(config: &GuildModerationConfig) -> String {
    let t = config.thresholds;
    let keywords = if config.keywords.is_empty() {
        "none".to_string()
    } else {
        config
            .keywords
            .iter()
            .map(|k| format!("`{k}`"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "**Moderation settings**\n\
         Enabled: {}\n\
         Escalation: {}\n\
         Case sensitive: {}\n\
         Bands: {} warning(s), {} timeout(s), {} kick(s), then ban\n\
         Timeout length: {}\n\
         Keywords: {keywords}",
        yes_no(config.enabled),
        yes_no(config.escalation_enabled),
        yes_no(config.case_sensitive),
        t.warning,
        t.timeout,
        t.kick,
        format_duration(config.timeout_duration),
    )
}

fn render_counts(title: &str, counts: &DailyCounts) -> String {
    format!(
        "__{title}__\n\
         Messages deleted: {}\n\
         Warnings: {}\n\
         Timeouts: {}\n\
         Kicks: {}\n\
         Bans: {}\n\
         Whitelist bypasses: {}\n",
        counts.messages_deleted,
        counts.warnings,
        counts.timeouts,
        counts.kicks,
        counts.bans,
        counts.whitelist_bypasses,
    )
}

/// `modconfig`.
pub struct ShowConfig {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for ShowConfig {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let config = self.engine.configs().get(guild_id).await?;
        Ok(CommandReply::ephemeral(render_config(&config)))
    }
}

/// `modconfig-set`.
pub struct SetConfig {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for SetConfig {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let options = &ctx.options;
        if options.is_empty() {
            return Err(CommandError::validation("Provide at least one setting to change"));
        }

        let enabled = options.boolean("enabled");
        let escalation = options.boolean("escalation");
        let case_sensitive = options.boolean("case_sensitive");
        let warnings = options.count("warnings")?;
        let timeouts = options.count("timeouts")?;
        let kicks = options.count("kicks")?;
        let timeout = options
            .count("timeout_minutes")?
            .map(|minutes| Duration::from_secs(u64::from(minutes) * 60));

        let config = self
            .engine
            .configs()
            .update(guild_id, |config| {
                if let Some(value) = enabled {
                    config.enabled = value;
                }
                if let Some(value) = escalation {
                    config.escalation_enabled = value;
                }
                if let Some(value) = case_sensitive {
                    config.case_sensitive = value;
                }
                if let Some(value) = warnings {
                    config.thresholds.warning = value;
                }
                if let Some(value) = timeouts {
                    config.thresholds.timeout = value;
                }
                if let Some(value) = kicks {
                    config.thresholds.kick = value;
                }
                if let Some(value) = timeout {
                    config.timeout_duration = value;
                }
            })
            .await?;
        Ok(CommandReply::ephemeral(format!(
            "Settings updated.\n\n{}",
            render_config(&config)
        )))
    }
}

/// `keyword-add`.
pub struct AddKeyword {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for AddKeyword {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let keyword = ctx.options.require_str("keyword")?.trim();
        let text = if self.engine.configs().add_keyword(guild_id, keyword).await? {
            format!("Added keyword `{keyword}`.")
        } else {
            format!("`{keyword}` is already blocked.")
        };
        Ok(CommandReply::ephemeral(text))
    }
}

/// `keyword-remove`.
pub struct RemoveKeyword {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for RemoveKeyword {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let keyword = ctx.options.require_str("keyword")?.trim();
        let text = if self.engine.configs().remove_keyword(guild_id, keyword).await? {
            format!("Removed keyword `{keyword}`.")
        } else {
            format!("`{keyword}` is not blocked.")
        };
        Ok(CommandReply::ephemeral(text))
    }
}

/// `whitelist-add`.
pub struct AddWhitelist {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for AddWhitelist {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let target = ctx.options.require_user("user")?;
        let reason = ctx.options.str("reason").map(str::to_string);
        let expires_at = expiry_in_days(ctx.options.integer("days"))?;

        let entry = self
            .engine
            .whitelist()
            .add(guild_id, target, ctx.user_id, reason, expires_at)
            .await?;
        Ok(CommandReply::ephemeral(format!(
            "<@{target}> is now exempt from keyword moderation (expires: {}).",
            describe_expiry(entry.expires_at)
        )))
    }
}

/// `whitelist-remove`.
pub struct RemoveWhitelist {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for RemoveWhitelist {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let target = ctx.options.require_user("user")?;
        let text = if self.engine.whitelist().remove(guild_id, target).await? {
            format!("<@{target}> is no longer exempt.")
        } else {
            format!("<@{target}> is not whitelisted.")
        };
        Ok(CommandReply::ephemeral(text))
    }
}

/// `whitelist-list`.
pub struct ListWhitelist {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for ListWhitelist {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let entries = self.engine.whitelist().list_active(guild_id).await?;
        if entries.is_empty() {
            return Ok(CommandReply::ephemeral("No members are whitelisted."));
        }

        let mut text = format!("**Whitelisted members ({})**\n", entries.len());
        for entry in &entries {
            let _ = write!(
                text,
                "<@{}> added by <@{}>, expires: {}",
                entry.user_id,
                entry.added_by,
                describe_expiry(entry.expires_at)
            );
            if let Some(reason) = &entry.reason {
                let _ = write!(text, " ({reason})");
            }
            text.push('\n');
        }
        Ok(CommandReply::ephemeral(text))
    }
}

/// `modstats`.
pub struct ShowStats {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for ShowStats {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let date = match ctx.options.str("date") {
            None => today(),
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                CommandError::validation(format!("`{raw}` is not a date in YYYY-MM-DD form"))
            })?,
        };

        let durable = self.engine.stats().daily_stats(guild_id, date).await?;
        let mut text = format!("**Moderation statistics for {date}**\n\n");
        text.push_str(&render_counts("Recorded", &durable));
        if date == today() {
            let live = self.engine.stats().realtime_stats(guild_id);
            text.push('\n');
            text.push_str(&render_counts("Since last reset", &live));
        }
        Ok(CommandReply::ephemeral(text))
    }
}

/// `offender`.
pub struct ShowOffender {
    engine: Arc<ModerationEngine>,
}

#[async_trait]
impl CommandHandler for ShowOffender {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let guild_id = ctx.require_guild()?;
        let target = ctx.options.require_user("user")?;

        let Some(record) = self.engine.offenders().find(guild_id, target).await? else {
            return Ok(CommandReply::ephemeral(format!("<@{target}> has no offenses.")));
        };
        let level = record
            .escalation_level
            .map_or_else(|| "none".to_string(), |action| action.to_string());
        let mut text = format!(
            "**Offense record for <@{target}>**\n\
             Offenses: {}\n\
             Last sanction: {level}\n\
             Banned: {}\n",
            record.offense_count,
            yes_no(record.is_banned),
        );
        if let Some(at) = record.last_offense_at {
            let _ = writeln!(text, "Last offense: {}", format_timestamp(at));
        }

        let entries = self
            .engine
            .logs()
            .recent(guild_id, target, RECENT_LOG_LIMIT)
            .await?;
        if !entries.is_empty() {
            text.push_str("\n__Recent actions__\n");
            for entry in &entries {
                let _ = writeln!(
                    text,
                    "{} {} ({}) [{}]: {}",
                    format_timestamp(entry.created_at),
                    entry.action,
                    entry.outcome,
                    entry.detected_keywords.join(", "),
                    entry.content_snippet
                );
            }
        }
        Ok(CommandReply::ephemeral(text))
    }
}
