//! # Warden Commands
//!
//! Command registration and dispatch for Warden.
//!
//! Command units are grouped into [`CommandSource`]s by category and loaded
//! into a [`CommandRegistry`]. The [`Dispatcher`] then runs each invocation
//! through cooldown, in-flight, option and permission checks before calling
//! the handler with panics and errors contained.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod builtin;
pub mod context;
pub mod cooldown;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod inflight;
pub mod options;
pub mod registry;

pub use builtin::{builtin_sources, BuiltinServices};
pub use context::{CommandContext, Invocation};
pub use cooldown::CooldownManager;
pub use descriptor::CommandDescriptor;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{CommandError, CommandResult};
pub use handler::{
    CommandDefinition, CommandHandler, CommandReply, CommandSource, LegacyRun, RunAdapter,
};
pub use inflight::{InFlightGuard, InFlightTracker};
pub use options::{CommandOptions, OptionKind, OptionSpec, OptionValue};
pub use registry::{CategoryIndex, CommandRegistry, CommandSummary};
