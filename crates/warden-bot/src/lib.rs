//! # Warden Bot
//!
//! Discord bot for command dispatch, role-based permissions and automated
//! keyword moderation.
//!
//! This is the binary crate that wires the store, permission resolver,
//! moderation engine and command dispatcher together and connects them to
//! Discord through the Poise framework.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod bot;
pub mod convert;
pub mod error;
pub mod gateway;

pub use app::App;
pub use bot::WardenBot;
pub use error::{BotError, BotResult};
pub use gateway::SerenityGateway;
