//! Integration tests for application wiring.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use warden_bot::app::build_resolver;
use warden_bot::App;
use warden_commands::{DispatchOutcome, Invocation};
use warden_common::test_utils::discord_fixtures::*;
use warden_common::{ChannelId, GuildId, MessageId, UserId};
use warden_config::Config;
use warden_moderation::{
    Action, GatewayError, InboundMessage, ModerationGateway, ProcessOutcome, RealtimeStats,
};
use warden_permissions::perm;
use warden_store::{MemoryStore, Store};

struct NoopGateway;

#[async_trait]
impl ModerationGateway for NoopGateway {
    async fn delete_message(&self, _channel: ChannelId, _message: MessageId) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn send_private_notice(&self, _user: UserId, _content: String) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn timeout_member(
        &self,
        _guild: GuildId,
        _user: UserId,
        _duration: Duration,
        _reason: String,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn kick_member(&self, _guild: GuildId, _user: UserId, _reason: String) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn ban_member(&self, _guild: GuildId, _user: UserId, _reason: String) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn can_sanction(&self, _guild: GuildId, _user: UserId, _action: Action) -> bool {
        true
    }
}

async fn build_app() -> App {
    warden_common::test_utils::init_test_logging();
    let mut config = Config::default();
    config.permissions.admin_ids = vec![test_admin_id().get()];

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let resolver = build_resolver(&config, Arc::clone(&store)).await.unwrap();
    App::build(
        &config,
        store,
        resolver,
        Arc::new(NoopGateway),
        Arc::new(RealtimeStats::new()),
    )
}

#[tokio::test]
async fn test_builtins_are_loaded() {
    let app = build_app().await;
    assert_eq!(app.dispatcher.registry().len(), 17);

    let outcome = app.dispatcher.dispatch(Invocation::new(test_user_id(), "about")).await;
    assert!(outcome.is_completed());
    assert!(outcome.reply().content.contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_configured_admins_are_seeded() {
    let app = build_app().await;
    assert!(app.resolver.has_permission(test_admin_id(), perm::ROLES_MANAGE).await);
    assert!(!app.resolver.has_permission(test_user_id(), perm::ROLES_MANAGE).await);

    let denied = app
        .dispatcher
        .dispatch(Invocation::new(test_user_id(), "modconfig").in_guild(test_guild_id()))
        .await;
    assert!(matches!(denied, DispatchOutcome::MissingPermission(_)));
}

#[tokio::test]
async fn test_commands_drive_moderation() {
    let app = build_app().await;
    let added = app
        .dispatcher
        .dispatch(
            Invocation::new(test_admin_id(), "keyword-add")
                .in_guild(test_guild_id())
                .option("keyword", "scam"),
        )
        .await;
    assert!(added.is_completed());

    let message = InboundMessage {
        author_id: test_user_id(),
        author_is_bot: false,
        guild_id: Some(test_guild_id()),
        guild_name: Some("Test Guild".into()),
        channel_id: test_channel_id(),
        message_id: test_message_id(1),
        content: "free SCAM here".into(),
    };
    match app.moderation.process_message(&message).await {
        ProcessOutcome::Sanctioned(report) => {
            assert_eq!(report.action, Action::Warning);
            assert_eq!(report.keywords, vec!["scam".to_string()]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}
