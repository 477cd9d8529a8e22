//! `about`, `uptime` and `help`.

use super::BuiltinServices;
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::handler::{CommandDefinition, CommandHandler, CommandReply, CommandSource, LegacyRun};
use crate::options::{OptionKind, OptionSpec};
use crate::registry::CategoryIndex;
use async_trait::async_trait;
use std::fmt::Write;
use std::time::Instant;
use warden_common::format_duration;

/// Category name.
pub const CATEGORY: &str = "general";

pub(super) fn source(services: &BuiltinServices) -> CommandSource {
    CommandSource::new(
        CATEGORY,
        vec![
            CommandDefinition::new("about")
                .description("Shows information about the bot")
                .run(About),
            CommandDefinition::new("uptime")
                .description("Shows how long the bot has been running")
                .execute(Uptime {
                    started_at: services.started_at,
                }),
            CommandDefinition::new("help")
                .description("Lists the available commands")
                .option(OptionSpec::optional("category", OptionKind::String, "Only list this category"))
                .execute(Help {
                    index: services.index.clone(),
                }),
        ],
    )
}

/// Static bot description.
pub struct About;

#[async_trait]
impl LegacyRun for About {
    async fn run(&self, _ctx: &CommandContext) -> CommandResult<String> {
        Ok(format!(
            "**Warden** v{}\n\
             Command dispatch, role-based permissions and automated keyword moderation.\n\
             Built with Rust and the Poise framework.",
            env!("CARGO_PKG_VERSION")
        ))
    }
}

/// Process uptime.
pub struct Uptime {
    started_at: Instant,
}

#[async_trait]
impl CommandHandler for Uptime {
    async fn execute(&self, _ctx: &CommandContext) -> CommandResult<CommandReply> {
        Ok(CommandReply::public(format!(
            "Bot uptime: {}",
            format_duration(self.started_at.elapsed())
        )))
    }
}

/// Category index listing.
pub struct Help {
    index: CategoryIndex,
}

#[async_trait]
impl CommandHandler for Help {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let wanted = ctx.options.str("category").map(str::to_lowercase);
        let index = self.index.read();

        let mut text = String::from("**Commands**\n");
        let mut listed = 0;
        for (category, commands) in index.iter() {
            if wanted.as_deref().is_some_and(|w| w != category) {
                continue;
            }
            let _ = writeln!(text, "\n__{category}__");
            for command in commands {
                let _ = writeln!(text, "`/{}` {}", command.name, command.description);
            }
            listed += 1;
        }

        if listed == 0 {
            return Err(CommandError::validation(format!(
                "Unknown category `{}`",
                wanted.unwrap_or_default()
            )));
        }
        Ok(CommandReply::ephemeral(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Invocation;
    use crate::options::{CommandOptions, OptionValue};
    use crate::registry::CommandRegistry;
    use warden_common::UserId;

    fn ctx(options: CommandOptions) -> CommandContext {
        CommandContext::new(&Invocation::new(UserId(1), "help"), options)
    }

    #[tokio::test]
    async fn test_help_lists_categories() {
        let mut registry = CommandRegistry::new();
        let help = Help {
            index: registry.category_index(),
        };
        registry.load_all([CommandSource::new(
            CATEGORY,
            vec![CommandDefinition::new("about").description("About").run(About)],
        )]);

        let reply = help.execute(&ctx(CommandOptions::default())).await.unwrap();
        assert!(reply.content.contains("__general__"));
        assert!(reply.content.contains("`/about` About"));

        let only = CommandOptions::from_values([("category", OptionValue::String("admin".into()))]);
        assert!(help.execute(&ctx(only)).await.is_err());
    }

    #[tokio::test]
    async fn test_about_mentions_version() {
        let text = About.run(&ctx(CommandOptions::default())).await.unwrap();
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
    }
}
