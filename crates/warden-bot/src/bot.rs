//! Core bot logic using the Poise framework.

use crate::app::{build_resolver, App};
use crate::convert::{create_command, inbound_message, invocation, MESSAGE_LIMIT};
use crate::error::{BotError, BotResult};
use crate::gateway::SerenityGateway;
use poise::serenity_prelude as serenity;
use serenity::{CreateInteractionResponse, CreateInteractionResponseMessage};
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_common::truncate_string;
use warden_config::Config;
use warden_moderation::{spawn_daily_reset, ProcessOutcome, RealtimeStats};
use warden_store::Store;

/// Main bot structure.
pub struct WardenBot {
    config: Arc<Config>,
    store: Arc<dyn Store>,
}

impl WardenBot {
    /// Creates a new bot instance.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Starts the bot and runs until the gateway connection ends.
    pub async fn start(&self) -> BotResult<()> {
        let resolver = build_resolver(&self.config, Arc::clone(&self.store)).await?;
        let realtime = Arc::new(RealtimeStats::new());
        let _reset = spawn_daily_reset(Arc::clone(&realtime));

        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);
        let framework = poise::Framework::builder()
            .options(poise::FrameworkOptions {
                event_handler: |ctx, event, framework, app| {
                    Box::pin(event_handler(ctx, event, framework, app))
                },
                ..Default::default()
            })
            .setup(move |ctx, ready, _framework| {
                Box::pin(async move {
                    info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");
                    let gateway = Arc::new(SerenityGateway::new(
                        Arc::clone(&ctx.http),
                        Arc::clone(&ctx.cache),
                    ));
                    let app = App::build(&config, store, resolver, gateway, realtime);
                    register_commands(ctx, &app, config.discord.dev_guild_id).await?;
                    Ok(app)
                })
            })
            .build();

        let intents = serenity::GatewayIntents::non_privileged()
            | serenity::GatewayIntents::MESSAGE_CONTENT
            | serenity::GatewayIntents::GUILD_MEMBERS;
        let mut client = serenity::ClientBuilder::new(&self.config.discord.token, intents)
            .framework(framework)
            .await
            .map_err(|e| BotError::Framework(format!("{e:?}")))?;

        client
            .start()
            .await
            .map_err(|e| BotError::Framework(format!("{e:?}")))?;
        Ok(())
    }
}

/// Registers every loaded command, in the development guild when one is set.
async fn register_commands(ctx: &serenity::Context, app: &App, dev_guild: Option<u64>) -> BotResult<()> {
    let commands: Vec<_> = app
        .dispatcher
        .registry()
        .descriptors()
        .iter()
        .map(|descriptor| create_command(descriptor))
        .collect();
    let count = commands.len();

    match dev_guild {
        Some(guild_id) => {
            serenity::GuildId::new(guild_id)
                .set_commands(&ctx.http, commands)
                .await?;
            info!(count, guild_id, "Registered guild commands");
        }
        None => {
            serenity::Command::set_global_commands(&ctx.http, commands).await?;
            info!(count, "Registered global commands");
        }
    }
    Ok(())
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, App, BotError>,
    app: &App,
) -> BotResult<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            let guild_name = new_message
                .guild_id
                .and_then(|id| ctx.cache.guild(id).map(|guild| guild.name.clone()));
            let outcome = app
                .moderation
                .process_message(&inbound_message(new_message, guild_name))
                .await;
            match outcome {
                ProcessOutcome::NotProcessed(reason) => {
                    debug!(message_id = %new_message.id, ?reason, "Message not moderated");
                }
                ProcessOutcome::Failed { error, .. } => {
                    warn!(message_id = %new_message.id, error = %error, "Moderation failed");
                }
                other => debug!(message_id = %new_message.id, outcome = ?other, "Moderated message"),
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Command(command),
        } => {
            let reply = app.dispatcher.dispatch(invocation(command)).await.reply();
            let message = CreateInteractionResponseMessage::new()
                .content(truncate_string(&reply.content, MESSAGE_LIMIT))
                .ephemeral(reply.ephemeral);
            command
                .create_response(&ctx.http, CreateInteractionResponse::Message(message))
                .await?;
        }
        _ => {}
    }
    Ok(())
}
