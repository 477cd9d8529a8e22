//! # Warden Config
//!
//! Type-safe configuration management for Warden.
//!
//! This crate provides the configuration schema with defaults, loading from
//! YAML or TOML files with environment overrides, validation, and an
//! atomically swappable configuration cache.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validator;

pub use cache::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
