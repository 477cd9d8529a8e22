//! Stored permission records.

use crate::roles::RoleType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use warden_common::UserId;
use warden_store::{id_value, Row, RowExt, StoreError, StoreResult};

/// Who performed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// Startup seeding and background sweeps.
    System,
    /// A user acting through a command.
    User(UserId),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

impl From<UserId> for Actor {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

fn opt_time(value: Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |t| Value::String(t.to_rfc3339()))
}

fn opt_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_string()))
}

/// A role granted to an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Row id, once stored.
    pub id: Option<i64>,
    /// Grantee.
    pub user_id: UserId,
    /// Granted role.
    pub role: RoleType,
    /// Actor that granted it.
    pub granted_by: String,
    /// Grant time.
    pub granted_at: DateTime<Utc>,
    /// Optional expiry; an expired grant is treated as absent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the grant is active.
    pub is_active: bool,
}

impl RoleGrant {
    /// A fresh, active grant.
    pub fn new(
        user_id: UserId,
        role: RoleType,
        actor: Actor,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            role,
            granted_by: actor.to_string(),
            granted_at: Utc::now(),
            expires_at,
            is_active: true,
        }
    }

    /// Active and not expired at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |at| at > now)
    }

    /// Decodes a `user_roles` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let role = row
            .get_str("role_type")?
            .parse()
            .map_err(|e: crate::PermissionError| StoreError::decode("role_type", e.to_string()))?;
        Ok(Self {
            id: row.get_i64("id").ok(),
            user_id: row.get_id("user_id")?,
            role,
            granted_by: row.get_opt_str("granted_by").unwrap_or("system").to_string(),
            granted_at: row.get_datetime("granted_at")?,
            expires_at: row.get_opt_datetime("expires_at")?,
            is_active: row.get_bool("is_active")?,
        })
    }

    /// Encodes the grant as a `user_roles` row, without the id.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), id_value(self.user_id));
        row.insert("role_type".into(), Value::from(self.role.as_str()));
        row.insert("granted_by".into(), Value::from(self.granted_by.clone()));
        row.insert("granted_at".into(), Value::from(self.granted_at.to_rfc3339()));
        row.insert("expires_at".into(), opt_time(self.expires_at));
        row.insert("is_active".into(), Value::from(self.is_active));
        row
    }
}

/// An explicit per-user grant or denial of a single permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Row id, once stored.
    pub id: Option<i64>,
    /// Affected identity.
    pub user_id: UserId,
    /// Permission name.
    pub permission: String,
    /// `true` grants, `false` denies.
    pub is_granted: bool,
    /// Actor that set it.
    pub granted_by: String,
    /// Time it was set.
    pub granted_at: DateTime<Utc>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form reason.
    pub reason: Option<String>,
}

impl PermissionOverride {
    /// Whether the override stopped applying at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Decodes a `user_permissions` row.
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: row.get_i64("id").ok(),
            user_id: row.get_id("user_id")?,
            permission: row.get_str("permission_name")?.to_string(),
            is_granted: row.get_bool("is_granted")?,
            granted_by: row.get_opt_str("granted_by").unwrap_or("system").to_string(),
            granted_at: row.get_datetime("granted_at")?,
            expires_at: row.get_opt_datetime("expires_at")?,
            reason: row.get_opt_str("reason").map(str::to_string),
        })
    }

    /// Encodes the override as a `user_permissions` row, without the id.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("user_id".into(), id_value(self.user_id));
        row.insert("permission_name".into(), Value::from(self.permission.clone()));
        row.insert("is_granted".into(), Value::from(self.is_granted));
        row.insert("granted_by".into(), Value::from(self.granted_by.clone()));
        row.insert("granted_at".into(), Value::from(self.granted_at.to_rfc3339()));
        row.insert("expires_at".into(), opt_time(self.expires_at));
        row.insert("reason".into(), opt_string(self.reason.as_deref()));
        row
    }
}

/// Kinds of audited permission changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A role was granted or refreshed.
    RoleGranted,
    /// A role was revoked.
    RoleRevoked,
    /// An override was set.
    PermissionGranted,
    /// An override was removed.
    PermissionRevoked,
    /// An expired override or grant was swept.
    Expired,
}

impl AuditAction {
    /// Stored name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoleGranted => "role_granted",
            Self::RoleRevoked => "role_revoked",
            Self::PermissionGranted => "permission_granted",
            Self::PermissionRevoked => "permission_revoked",
            Self::Expired => "expired",
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened.
    pub action: AuditAction,
    /// Affected identity.
    pub target: UserId,
    /// Who did it.
    pub actor: String,
    /// Role involved, if any.
    pub role: Option<RoleType>,
    /// Permission involved, if any.
    pub permission: Option<String>,
    /// Human readable details.
    pub details: String,
    /// Time of the change.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// A new entry timestamped now.
    pub fn new(action: AuditAction, target: UserId, actor: Actor, details: impl Into<String>) -> Self {
        Self {
            action,
            target,
            actor: actor.to_string(),
            role: None,
            permission: None,
            details: details.into(),
            created_at: Utc::now(),
        }
    }

    /// Attach the role involved.
    #[must_use]
    pub fn with_role(mut self, role: RoleType) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach the permission involved.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Encodes the entry as a `permission_audit_log` row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("action".into(), Value::from(self.action.as_str()));
        row.insert("target_user_id".into(), id_value(self.target));
        row.insert("actor_id".into(), Value::from(self.actor.clone()));
        row.insert(
            "role_type".into(),
            opt_string(self.role.map(RoleType::as_str)),
        );
        row.insert("permission_name".into(), opt_string(self.permission.as_deref()));
        row.insert("details".into(), Value::from(self.details.clone()));
        row.insert("created_at".into(), Value::from(self.created_at.to_rfc3339()));
        row
    }
}

/// Read-only summary of an identity's access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Identity described.
    pub user_id: UserId,
    /// Effective role grants.
    pub roles: Vec<RoleGrant>,
    /// Unexpired overrides.
    pub overrides: Vec<PermissionOverride>,
    /// Role-derived permissions with overrides applied.
    pub permissions: BTreeSet<String>,
    /// Whether the identity bypasses every check.
    pub is_super_admin: bool,
}
