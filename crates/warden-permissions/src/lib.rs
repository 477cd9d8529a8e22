//! # Warden Permissions
//!
//! Resolves whether an identity holds a named permission.
//!
//! Resolution merges three sources in a fixed priority: the super-admin set
//! (active admin grants), explicit per-user overrides, and the permission
//! tables of the identity's active roles. Results are cached for a fixed TTL
//! and every mutation invalidates the affected identity synchronously.
//! Store faults during a check deny access.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod models;
pub mod repository;
pub mod resolver;
pub mod roles;

pub use error::{PermissionError, PermissionResult};
pub use models::{Actor, AuditAction, AuditEntry, PermissionOverride, RoleGrant, UserInfo};
pub use repository::PermissionRepository;
pub use resolver::{PermissionCheck, PermissionResolver, PurgeReport};
pub use roles::{perm, RoleType};
