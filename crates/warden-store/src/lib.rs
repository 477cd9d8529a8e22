//! # Warden Store
//!
//! The relational store adapter every other crate talks to.
//!
//! Components never reach for a global connection: they receive an
//! `Arc<dyn Store>` at construction time. Two implementations ship here:
//! [`MemoryStore`] for tests and embedded use, and [`SqliteStore`] backed by
//! an `sqlx` connection pool.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod row;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use row::{id_value, Conditions, Row, RowExt, SelectOptions, SortOrder};
pub use sqlite::SqliteStore;
pub use store::Store;
