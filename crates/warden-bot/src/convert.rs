//! Translation between Discord payloads and Warden's own types.

use poise::serenity_prelude as serenity;
use serde_json::Value;
use serenity::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, CreateCommand,
    CreateCommandOption, Message,
};
use warden_commands::{CommandDescriptor, Invocation, OptionKind};
use warden_common::{truncate_string, ChannelId, GuildId, MessageId, UserId};
use warden_moderation::InboundMessage;

/// Longest message Discord accepts, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Longest command description Discord accepts, in characters.
const DESCRIPTION_LIMIT: usize = 100;

/// Raw JSON form of an option value; `None` for kinds commands never declare.
pub fn option_value(value: &CommandDataOptionValue) -> Option<Value> {
    match value {
        CommandDataOptionValue::String(s) => Some(Value::from(s.clone())),
        CommandDataOptionValue::Integer(n) => Some(Value::from(*n)),
        CommandDataOptionValue::Boolean(b) => Some(Value::from(*b)),
        CommandDataOptionValue::Number(n) => Some(Value::from(*n)),
        CommandDataOptionValue::User(id) => Some(Value::from(id.get().to_string())),
        _ => None,
    }
}

/// The invocation carried by a slash command interaction.
pub fn invocation(command: &CommandInteraction) -> Invocation {
    let mut invocation = Invocation::new(UserId(command.user.id.get()), command.data.name.clone());
    invocation.guild_id = command.guild_id.map(|id| GuildId(id.get()));
    invocation.channel_id = Some(ChannelId(command.channel_id.get()));
    for option in &command.data.options {
        if let Some(value) = option_value(&option.value) {
            invocation.raw_options.insert(option.name.clone(), value);
        }
    }
    invocation
}

/// The moderation view of a chat message.
pub fn inbound_message(message: &Message, guild_name: Option<String>) -> InboundMessage {
    InboundMessage {
        author_id: UserId(message.author.id.get()),
        author_is_bot: message.author.bot,
        guild_id: message.guild_id.map(|id| GuildId(id.get())),
        guild_name,
        channel_id: ChannelId(message.channel_id.get()),
        message_id: MessageId(message.id.get()),
        content: message.content.clone(),
    }
}

const fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::Boolean => CommandOptionType::Boolean,
        OptionKind::User => CommandOptionType::User,
    }
}

/// Slash command registration payload of `descriptor`.
pub fn create_command(descriptor: &CommandDescriptor) -> CreateCommand {
    let description = if descriptor.description.is_empty() {
        descriptor.name.clone()
    } else {
        truncate_string(&descriptor.description, DESCRIPTION_LIMIT)
    };
    let options = descriptor
        .options
        .iter()
        .map(|spec| {
            let help = if spec.description.is_empty() {
                spec.name.clone()
            } else {
                truncate_string(&spec.description, DESCRIPTION_LIMIT)
            };
            CreateCommandOption::new(option_type(spec.kind), &spec.name, help).required(spec.required)
        })
        .collect();

    CreateCommand::new(&descriptor.name)
        .description(description)
        .set_options(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use warden_commands::{CommandContext, CommandHandler, CommandReply, CommandResult, OptionSpec};

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(&self, _ctx: &CommandContext) -> CommandResult<CommandReply> {
            Ok(CommandReply::public(""))
        }
    }

    #[test]
    fn test_option_values() {
        assert_eq!(
            option_value(&CommandDataOptionValue::String("spam".into())),
            Some(Value::from("spam"))
        );
        assert_eq!(option_value(&CommandDataOptionValue::Integer(3)), Some(Value::from(3)));
        assert_eq!(
            option_value(&CommandDataOptionValue::User(serenity::UserId::new(42))),
            Some(Value::from("42"))
        );
        assert_eq!(option_value(&CommandDataOptionValue::Boolean(true)), Some(Value::from(true)));
    }

    #[test]
    fn test_create_command_payload() {
        let descriptor = CommandDescriptor {
            name: "role-grant".into(),
            description: "Grants a role to a member".into(),
            category: "admin".into(),
            cooldown: None,
            options: vec![
                OptionSpec::required("user", OptionKind::User, "Target member"),
                OptionSpec::optional("days", OptionKind::Integer, ""),
            ],
            required_permission: None,
            handler: Arc::new(Noop),
        };

        let payload = serde_json::to_value(create_command(&descriptor)).unwrap();
        assert_eq!(payload["name"], "role-grant");
        assert_eq!(payload["description"], "Grants a role to a member");
        assert_eq!(payload["options"][0]["name"], "user");
        assert_eq!(payload["options"][0]["required"], true);
        assert_eq!(payload["options"][1]["description"], "days");
    }
}
