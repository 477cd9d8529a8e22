//! # Warden Common
//!
//! Shared types, utilities, and common functionality for Warden.
//!
//! This crate provides the identifier newtypes, the workspace-wide error type,
//! the logging bootstrap and the TTL cache used by every other crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
pub mod logging;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use cache::TtlCache;
pub use error::{Result, WardenError};
pub use logging::{init_logging, LoggingConfig, LoggingGuard};
pub use types::*;
pub use utils::*;
