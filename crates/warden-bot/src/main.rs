//! Main entry point for Warden.

use anyhow::Context;
use tracing::{error, info};
use warden_bot::app::open_store;
use warden_bot::WardenBot;
use warden_common::init_logging;
use warden_config::ConfigLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _logging = init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Warden");

    let store = open_store(&config.database)
        .await
        .context("Failed to open store")?;
    let bot = WardenBot::new(config, store);

    if let Err(e) = bot.start().await {
        error!(error = %e, "Bot stopped with an error");
        return Err(e.into());
    }
    Ok(())
}
