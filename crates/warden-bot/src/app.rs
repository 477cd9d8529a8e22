//! Wiring of the store, resolver, moderation engine and dispatcher.

use crate::error::BotResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use warden_commands::{builtin_sources, BuiltinServices, CommandRegistry, Dispatcher};
use warden_common::UserId;
use warden_config::{Config, DatabaseConfig, StoreBackend};
use warden_moderation::{ModerationEngine, ModerationGateway, RealtimeStats};
use warden_permissions::PermissionResolver;
use warden_store::{MemoryStore, SqliteStore, Store};

/// Opens the configured store.
pub async fn open_store(config: &DatabaseConfig) -> BotResult<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(&config.url, config.max_connections).await?),
        StoreBackend::Memory => {
            info!("Using in-memory store; nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Builds the permission resolver and grants the configured admins.
pub async fn build_resolver(config: &Config, store: Arc<dyn Store>) -> BotResult<Arc<PermissionResolver>> {
    let resolver = Arc::new(PermissionResolver::with_ttl(
        store,
        config.permissions.cache_ttl(),
    ));
    let admins: Vec<UserId> = config.permissions.admin_ids.iter().copied().map(UserId).collect();
    let seeded = resolver.seed_admins(&admins).await?;
    info!(configured = admins.len(), seeded, "Seeded admin grants");
    Ok(resolver)
}

/// Shared state of the running bot.
#[derive(Debug)]
pub struct App {
    /// Command dispatcher.
    pub dispatcher: Arc<Dispatcher>,
    /// Moderation pipeline.
    pub moderation: Arc<ModerationEngine>,
    /// Permission resolver.
    pub resolver: Arc<PermissionResolver>,
}

impl App {
    /// Wires every component over `store` and `gateway`.
    pub fn build(
        config: &Config,
        store: Arc<dyn Store>,
        resolver: Arc<PermissionResolver>,
        gateway: Arc<dyn ModerationGateway>,
        realtime: Arc<RealtimeStats>,
    ) -> Self {
        let moderation = Arc::new(ModerationEngine::new(
            store,
            gateway,
            config.moderation.clone(),
            realtime,
        ));

        let mut registry = CommandRegistry::new();
        let services = BuiltinServices {
            resolver: Arc::clone(&resolver),
            moderation: Arc::clone(&moderation),
            started_at: Instant::now(),
            index: registry.category_index(),
        };
        registry.load_all(builtin_sources(&services));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            resolver.clone(),
            config.commands.clone(),
        ));
        Self {
            dispatcher,
            moderation,
            resolver,
        }
    }
}
