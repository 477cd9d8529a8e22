//! # Warden Moderation
//!
//! Automated keyword moderation with escalating sanctions.
//!
//! Every guild message flows through [`ModerationEngine::process_message`]:
//! the guild configuration and whitelist are consulted, the body is scanned
//! for blocked keywords, and a violation is answered with a warning,
//! timeout, kick or ban depending on the offender's running offense count.
//! Each step is logged and counted, durably and in memory.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod gateway;
pub mod keywords;
mod locks;
pub mod log;
pub mod message;
pub mod offenders;
pub mod stats;
pub mod whitelist;

pub use config::{GuildModerationConfig, ModerationConfigStore};
pub use engine::{ModerationEngine, ProcessOutcome, SanctionReport, SanctionStatus, SkipReason};
pub use error::{ModerationError, ModerationResult};
pub use escalation::{escalate, Action, Thresholds};
pub use gateway::{GatewayError, ModerationGateway};
pub use keywords::KeywordMatcher;
pub use log::{LogAction, LogOutcome, ModerationLog, ModerationLogEntry};
pub use message::InboundMessage;
pub use offenders::{OffenderRecord, OffenderRepository};
pub use stats::{spawn_daily_reset, DailyCounts, RealtimeStats, StatCounter, StatsRecorder};
pub use whitelist::{Whitelist, WhitelistEntry};
