//! Typed access to the permission tables.

use crate::models::{AuditEntry, PermissionOverride, RoleGrant};
use crate::roles::RoleType;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use warden_common::UserId;
use warden_store::schema::{PERMISSION_AUDIT_LOG, USER_PERMISSIONS, USER_ROLES};
use warden_store::{id_value, Conditions, RowExt, SelectOptions, SortOrder, Store, StoreResult};

/// Reads and writes role grants, overrides and audit entries.
#[derive(Clone)]
pub struct PermissionRepository {
    store: Arc<dyn Store>,
}

impl PermissionRepository {
    /// Wraps a store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Store health flag.
    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    fn user_key(user_id: UserId) -> Conditions {
        Conditions::new().eq("user_id", id_value(user_id))
    }

    /// Grants of `user_id` that are active and unexpired at `now`.
    pub async fn effective_roles(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<RoleGrant>> {
        let rows = self
            .store
            .select(
                USER_ROLES,
                &Self::user_key(user_id).eq("is_active", true),
                &SelectOptions::default().order_by("role_type", SortOrder::Ascending),
            )
            .await?;
        let grants = rows
            .iter()
            .map(RoleGrant::from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(grants.into_iter().filter(|g| g.is_effective(now)).collect())
    }

    /// Identities holding an effective admin grant at `now`.
    pub async fn admin_ids(&self, now: DateTime<Utc>) -> StoreResult<HashSet<UserId>> {
        let rows = self
            .store
            .select(
                USER_ROLES,
                &Conditions::new()
                    .eq("role_type", RoleType::Admin.as_str())
                    .eq("is_active", true),
                &SelectOptions::default(),
            )
            .await?;
        let mut ids = HashSet::new();
        for row in &rows {
            let grant = RoleGrant::from_row(row)?;
            if grant.is_effective(now) {
                ids.insert(grant.user_id);
            }
        }
        Ok(ids)
    }

    /// The stored grant of `role` to `user_id`, active or not.
    pub async fn find_role(&self, user_id: UserId, role: RoleType) -> StoreResult<Option<RoleGrant>> {
        self.store
            .select_one(USER_ROLES, &Self::user_key(user_id).eq("role_type", role.as_str()))
            .await?
            .as_ref()
            .map(RoleGrant::from_row)
            .transpose()
    }

    /// Inserts the grant or refreshes the existing row for the same
    /// `(user, role)`. Returns the row id.
    pub async fn upsert_role(&self, grant: &RoleGrant) -> StoreResult<i64> {
        match self.find_role(grant.user_id, grant.role).await? {
            Some(RoleGrant { id: Some(id), .. }) => {
                self.store.update(USER_ROLES, grant.to_row(), id).await?;
                debug!(user_id = %grant.user_id, role = %grant.role, id, "Refreshed role grant");
                Ok(id)
            }
            _ => self.store.insert(USER_ROLES, grant.to_row()).await,
        }
    }

    /// Removes the grant of `role` to `user_id`. Returns the number of rows removed.
    pub async fn delete_role(&self, user_id: UserId, role: RoleType) -> StoreResult<u64> {
        self.store
            .delete(USER_ROLES, &Self::user_key(user_id).eq("role_type", role.as_str()))
            .await
    }

    /// Active grants whose expiry passed before `now`.
    pub async fn expired_roles(&self, now: DateTime<Utc>) -> StoreResult<Vec<RoleGrant>> {
        let rows = self
            .store
            .select(
                USER_ROLES,
                &Conditions::new().eq("is_active", true),
                &SelectOptions::default(),
            )
            .await?;
        let grants = rows
            .iter()
            .map(RoleGrant::from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(grants.into_iter().filter(|g| !g.is_effective(now)).collect())
    }

    /// The override of `permission` for `user_id`, expired or not.
    pub async fn find_override(
        &self,
        user_id: UserId,
        permission: &str,
    ) -> StoreResult<Option<PermissionOverride>> {
        self.store
            .select_one(
                USER_PERMISSIONS,
                &Self::user_key(user_id).eq("permission_name", permission),
            )
            .await?
            .as_ref()
            .map(PermissionOverride::from_row)
            .transpose()
    }

    /// Every override stored for `user_id`.
    pub async fn overrides(&self, user_id: UserId) -> StoreResult<Vec<PermissionOverride>> {
        self.store
            .select(USER_PERMISSIONS, &Self::user_key(user_id), &SelectOptions::default())
            .await?
            .iter()
            .map(PermissionOverride::from_row)
            .collect()
    }

    /// Overrides whose expiry passed before `now`.
    pub async fn expired_overrides(&self, now: DateTime<Utc>) -> StoreResult<Vec<PermissionOverride>> {
        let rows = self
            .store
            .select(USER_PERMISSIONS, &Conditions::new(), &SelectOptions::default())
            .await?;
        let overrides = rows
            .iter()
            .map(PermissionOverride::from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(overrides.into_iter().filter(|o| o.is_expired(now)).collect())
    }

    /// Inserts the override or replaces the stored one for the same
    /// `(user, permission)`.
    pub async fn upsert_override(&self, entry: &PermissionOverride) -> StoreResult<i64> {
        match self.find_override(entry.user_id, &entry.permission).await? {
            Some(PermissionOverride { id: Some(id), .. }) => {
                self.store.update(USER_PERMISSIONS, entry.to_row(), id).await?;
                Ok(id)
            }
            _ => self.store.insert(USER_PERMISSIONS, entry.to_row()).await,
        }
    }

    /// Removes the override of `permission` for `user_id`.
    pub async fn delete_override(&self, user_id: UserId, permission: &str) -> StoreResult<u64> {
        self.store
            .delete(
                USER_PERMISSIONS,
                &Self::user_key(user_id).eq("permission_name", permission),
            )
            .await
    }

    /// Appends an audit entry.
    pub async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<i64> {
        self.store.insert(PERMISSION_AUDIT_LOG, entry.to_row()).await
    }

    /// Number of audit entries recorded for `user_id`.
    pub async fn audit_count(&self, user_id: UserId) -> StoreResult<usize> {
        let rows = self
            .store
            .select(
                PERMISSION_AUDIT_LOG,
                &Conditions::new().eq("target_user_id", id_value(user_id)),
                &SelectOptions::default(),
            )
            .await?;
        Ok(rows.iter().filter(|r| r.get_opt_str("action").is_some()).count())
    }
}

impl std::fmt::Debug for PermissionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRepository")
            .field("available", &self.is_available())
            .finish()
    }
}
