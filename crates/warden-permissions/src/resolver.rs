//! Permission resolution with caching and audited mutations.

use crate::error::{PermissionError, PermissionResult};
use crate::models::{Actor, AuditAction, AuditEntry, PermissionOverride, RoleGrant, UserInfo};
use crate::repository::PermissionRepository;
use crate::roles::RoleType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use warden_common::cache::DEFAULT_CACHE_TTL;
use warden_common::{TtlCache, UserId};
use warden_store::{Store, StoreError};

/// Answers "may this identity do that?".
///
/// Implemented by [`PermissionResolver`]; the dispatcher depends on this
/// trait only.
#[async_trait]
pub trait PermissionCheck: Send + Sync {
    /// Whether `user_id` holds `permission`. Never fails; faults deny.
    async fn has_permission(&self, user_id: UserId, permission: &str) -> bool;
}

/// Outcome of [`PermissionResolver::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired overrides removed.
    pub overrides: usize,
    /// Expired role grants removed.
    pub grants: usize,
}

struct SuperAdminSet {
    ids: HashSet<UserId>,
    loaded_at: Instant,
}

/// Resolves permissions from roles, overrides and the super-admin set.
pub struct PermissionResolver {
    repo: PermissionRepository,
    permission_cache: TtlCache<(UserId, String), bool>,
    role_cache: TtlCache<UserId, Arc<Vec<RoleType>>>,
    super_admins: RwLock<Option<SuperAdminSet>>,
    ttl: Duration,
}

impl PermissionResolver {
    /// Creates a resolver with the default five minute cache TTL.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    /// Creates a resolver whose caches expire after `ttl`.
    pub fn with_ttl(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            repo: PermissionRepository::new(store),
            permission_cache: TtlCache::new("permissions", ttl),
            role_cache: TtlCache::new("roles", ttl),
            super_admins: RwLock::new(None),
            ttl,
        }
    }

    /// Typed access to the underlying tables.
    pub fn repository(&self) -> &PermissionRepository {
        &self.repo
    }

    /// Whether `user_id` holds `permission`.
    ///
    /// Priority: super-admin bypass, cached answer, unexpired override,
    /// role tables, deny. Any store fault denies and is not cached.
    pub async fn has_permission(&self, user_id: UserId, permission: &str) -> bool {
        match self.resolve(user_id, permission).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(%user_id, permission, error = %e, "Permission check failed, denying");
                false
            }
        }
    }

    async fn resolve(&self, user_id: UserId, permission: &str) -> PermissionResult<bool> {
        if self.super_admin(user_id).await? {
            debug!(%user_id, permission, "Super-admin bypass");
            return Ok(true);
        }

        let key = (user_id, permission.to_string());
        if let Some(granted) = self.permission_cache.get(&key).await {
            debug!(%user_id, permission, granted, "Permission cache hit");
            return Ok(granted);
        }

        if !self.repo.is_available() {
            return Err(StoreError::Unavailable.into());
        }

        let now = Utc::now();
        if let Some(entry) = self.repo.find_override(user_id, permission).await? {
            if entry.is_expired(now) {
                self.repo.delete_override(user_id, permission).await?;
                info!(%user_id, permission, "Revoked expired permission override");
                self.audit(
                    AuditEntry::new(AuditAction::Expired, user_id, Actor::System, "override expired")
                        .with_permission(permission),
                )
                .await;
            } else {
                self.permission_cache.insert(key, entry.is_granted).await;
                return Ok(entry.is_granted);
            }
        }

        let roles = self.active_roles(user_id).await?;
        let granted = roles.iter().any(|role| role.grants(permission));
        self.permission_cache.insert(key, granted).await;
        Ok(granted)
    }

    /// Active role types of `user_id`, cached.
    pub async fn active_roles(&self, user_id: UserId) -> PermissionResult<Arc<Vec<RoleType>>> {
        if let Some(roles) = self.role_cache.get(&user_id).await {
            return Ok(roles);
        }
        let roles: Vec<RoleType> = self
            .repo
            .effective_roles(user_id, Utc::now())
            .await?
            .into_iter()
            .map(|g| g.role)
            .collect();
        let roles = Arc::new(roles);
        self.role_cache.insert(user_id, Arc::clone(&roles)).await;
        Ok(roles)
    }

    async fn super_admin(&self, user_id: UserId) -> PermissionResult<bool> {
        let cached = {
            let guard = self.super_admins.read();
            guard
                .as_ref()
                .filter(|set| set.loaded_at.elapsed() < self.ttl)
                .map(|set| set.ids.contains(&user_id))
        };
        if let Some(is_admin) = cached {
            return Ok(is_admin);
        }

        let ids = self.repo.admin_ids(Utc::now()).await?;
        let is_admin = ids.contains(&user_id);
        debug!(count = ids.len(), "Loaded super-admin set");
        *self.super_admins.write() = Some(SuperAdminSet {
            ids,
            loaded_at: Instant::now(),
        });
        Ok(is_admin)
    }

    /// Whether `user_id` bypasses every permission check. Faults deny.
    pub async fn is_super_admin(&self, user_id: UserId) -> bool {
        self.super_admin(user_id).await.unwrap_or_else(|e| {
            warn!(%user_id, error = %e, "Super-admin lookup failed");
            false
        })
    }

    /// Grants `role` to `target`, refreshing an existing grant.
    pub async fn grant_role(
        &self,
        target: UserId,
        role: &str,
        actor: Actor,
        expires_at: Option<DateTime<Utc>>,
    ) -> PermissionResult<RoleGrant> {
        let role: RoleType = role.parse()?;
        let mut grant = RoleGrant::new(target, role, actor, expires_at);

        let id = self.repo.upsert_role(&grant).await.map_err(|e| {
            error!(%target, %role, error = %e, "Failed to store role grant");
            e
        })?;
        grant.id = Some(id);

        self.invalidate_user(target).await;
        if role == RoleType::Admin {
            match expires_at {
                None => self.update_super_admins(target, true),
                // Reload so the expiry is honored
                Some(_) => self.reset_super_admins(),
            }
        }
        info!(%target, %role, %actor, "Granted role");

        self.audit(
            AuditEntry::new(AuditAction::RoleGranted, target, actor, format!("granted {role}"))
                .with_role(role),
        )
        .await;
        Ok(grant)
    }

    /// Revokes `role` from `target`. Returns whether a grant existed.
    pub async fn revoke_role(&self, target: UserId, role: &str, actor: Actor) -> PermissionResult<bool> {
        let role: RoleType = role.parse()?;
        let removed = self.repo.delete_role(target, role).await.map_err(|e| {
            error!(%target, %role, error = %e, "Failed to revoke role");
            e
        })?;

        self.invalidate_user(target).await;
        if role == RoleType::Admin {
            self.update_super_admins(target, false);
        }
        info!(%target, %role, %actor, removed, "Revoked role");

        self.audit(
            AuditEntry::new(AuditAction::RoleRevoked, target, actor, format!("revoked {role}"))
                .with_role(role),
        )
        .await;
        Ok(removed > 0)
    }

    /// Sets an explicit grant (`granted = true`) or denial for `permission`.
    pub async fn grant_user_permission(
        &self,
        target: UserId,
        permission: &str,
        granted: bool,
        actor: Actor,
        expires_at: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> PermissionResult<PermissionOverride> {
        validate_permission_name(permission)?;
        let mut entry = PermissionOverride {
            id: None,
            user_id: target,
            permission: permission.to_string(),
            is_granted: granted,
            granted_by: actor.to_string(),
            granted_at: Utc::now(),
            expires_at,
            reason,
        };

        let id = self.repo.upsert_override(&entry).await.map_err(|e| {
            error!(%target, permission, error = %e, "Failed to store permission override");
            e
        })?;
        entry.id = Some(id);

        self.invalidate_user(target).await;
        info!(%target, permission, granted, %actor, "Set permission override");

        let verb = if granted { "granted" } else { "denied" };
        self.audit(
            AuditEntry::new(
                AuditAction::PermissionGranted,
                target,
                actor,
                format!("{verb} {permission}"),
            )
            .with_permission(permission),
        )
        .await;
        Ok(entry)
    }

    /// Removes the override for `permission`. Returns whether one existed.
    pub async fn revoke_user_permission(
        &self,
        target: UserId,
        permission: &str,
        actor: Actor,
    ) -> PermissionResult<bool> {
        validate_permission_name(permission)?;
        let removed = self.repo.delete_override(target, permission).await.map_err(|e| {
            error!(%target, permission, error = %e, "Failed to remove permission override");
            e
        })?;

        self.invalidate_user(target).await;
        info!(%target, permission, %actor, removed, "Removed permission override");

        self.audit(
            AuditEntry::new(
                AuditAction::PermissionRevoked,
                target,
                actor,
                format!("removed override {permission}"),
            )
            .with_permission(permission),
        )
        .await;
        Ok(removed > 0)
    }

    /// Roles, overrides and effective permissions of `user_id`. Not cached.
    pub async fn get_user_info(&self, user_id: UserId) -> PermissionResult<UserInfo> {
        let now = Utc::now();
        let roles = self.repo.effective_roles(user_id, now).await?;
        let overrides: Vec<PermissionOverride> = self
            .repo
            .overrides(user_id)
            .await?
            .into_iter()
            .filter(|o| !o.is_expired(now))
            .collect();
        let is_super_admin = roles.iter().any(|g| g.role == RoleType::Admin);

        let mut permissions: BTreeSet<String> = roles
            .iter()
            .flat_map(|g| g.role.permissions().iter().map(|p| (*p).to_string()))
            .collect();
        for entry in &overrides {
            if entry.is_granted {
                permissions.insert(entry.permission.clone());
            } else {
                permissions.remove(&entry.permission);
            }
        }

        Ok(UserInfo {
            user_id,
            roles,
            overrides,
            permissions,
            is_super_admin,
        })
    }

    /// Grants the admin role to every id lacking an effective one.
    /// Returns the number of grants written.
    pub async fn seed_admins(&self, ids: &[UserId]) -> PermissionResult<usize> {
        let now = Utc::now();
        let mut seeded = 0;
        for &id in ids {
            let existing = self.repo.find_role(id, RoleType::Admin).await?;
            if existing.is_some_and(|g| g.is_effective(now)) {
                debug!(user_id = %id, "Admin already seeded");
                continue;
            }
            self.grant_role(id, RoleType::Admin.as_str(), Actor::System, None)
                .await?;
            seeded += 1;
        }
        if seeded > 0 {
            info!(seeded, "Seeded admin grants from configuration");
        }
        Ok(seeded)
    }

    /// Removes every expired override and role grant.
    pub async fn purge_expired(&self) -> PermissionResult<PurgeReport> {
        let now = Utc::now();
        let mut report = PurgeReport::default();

        for entry in self.repo.expired_overrides(now).await? {
            self.repo.delete_override(entry.user_id, &entry.permission).await?;
            self.invalidate_user(entry.user_id).await;
            self.audit(
                AuditEntry::new(AuditAction::Expired, entry.user_id, Actor::System, "override expired")
                    .with_permission(entry.permission),
            )
            .await;
            report.overrides += 1;
        }

        let mut admin_removed = false;
        for grant in self.repo.expired_roles(now).await? {
            self.repo.delete_role(grant.user_id, grant.role).await?;
            self.invalidate_user(grant.user_id).await;
            admin_removed |= grant.role == RoleType::Admin;
            self.audit(
                AuditEntry::new(AuditAction::Expired, grant.user_id, Actor::System, "grant expired")
                    .with_role(grant.role),
            )
            .await;
            report.grants += 1;
        }
        if admin_removed {
            self.reset_super_admins();
        }

        if report.overrides + report.grants > 0 {
            info!(
                overrides = report.overrides,
                grants = report.grants,
                "Purged expired permission records"
            );
        }
        Ok(report)
    }

    /// Drops every cached answer for `user_id`.
    pub async fn invalidate_user(&self, user_id: UserId) {
        self.permission_cache
            .invalidate_where(move |(cached_user, _), _| *cached_user == user_id);
        self.role_cache.invalidate(&user_id).await;
        debug!(%user_id, "Invalidated permission caches");
    }

    fn reset_super_admins(&self) {
        *self.super_admins.write() = None;
    }

    fn update_super_admins(&self, user_id: UserId, is_admin: bool) {
        let mut guard = self.super_admins.write();
        match guard.as_mut() {
            Some(set) if is_admin => {
                set.ids.insert(user_id);
            }
            Some(set) => {
                set.ids.remove(&user_id);
            }
            None => {}
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.repo.append_audit(&entry).await {
            warn!(
                action = entry.action.as_str(),
                target = %entry.target,
                error = %e,
                "Failed to append permission audit entry"
            );
        }
    }
}

#[async_trait]
impl PermissionCheck for PermissionResolver {
    async fn has_permission(&self, user_id: UserId, permission: &str) -> bool {
        PermissionResolver::has_permission(self, user_id, permission).await
    }
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("repo", &self.repo)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn validate_permission_name(permission: &str) -> PermissionResult<()> {
    if permission.is_empty() || permission.chars().any(char::is_whitespace) {
        return Err(PermissionError::InvalidPermission(permission.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::perm;
    use warden_common::test_utils::discord_fixtures::*;
    use warden_store::MemoryStore;

    fn resolver() -> (Arc<MemoryStore>, PermissionResolver) {
        let store = Arc::new(MemoryStore::new());
        let resolver = PermissionResolver::new(store.clone());
        (store, resolver)
    }

    #[tokio::test]
    async fn test_default_deny() {
        let (_store, resolver) = resolver();
        assert!(!resolver.has_permission(test_user_id(), perm::USERS_INFO).await);
    }

    #[tokio::test]
    async fn test_role_derived_permission() {
        let (_store, resolver) = resolver();
        let user = test_user_id();
        resolver
            .grant_role(user, "helper", Actor::System, None)
            .await
            .unwrap();

        assert!(resolver.has_permission(user, perm::MODERATION_STATS).await);
        assert!(!resolver.has_permission(user, perm::MODERATION_CONFIG).await);
    }

    #[tokio::test]
    async fn test_unknown_role_is_validation_error() {
        let (store, resolver) = resolver();
        let err = resolver
            .grant_role(test_user_id(), "owner", Actor::System, None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.row_count(warden_store::schema::USER_ROLES), 0);
    }

    #[tokio::test]
    async fn test_grant_invalidates_cached_denial() {
        let (_store, resolver) = resolver();
        let user = test_user_id();
        assert!(!resolver.has_permission(user, perm::USERS_INFO).await);

        resolver
            .grant_role(user, "moderator", Actor::User(test_admin_id()), None)
            .await
            .unwrap();
        assert!(resolver.has_permission(user, perm::USERS_INFO).await);
    }

    #[tokio::test]
    async fn test_expired_override_is_revoked_on_lookup() {
        let (store, resolver) = resolver();
        let user = test_user_id();
        let past = Utc::now() - chrono::Duration::minutes(5);
        resolver
            .grant_user_permission(user, perm::USERS_INFO, true, Actor::System, Some(past), None)
            .await
            .unwrap();

        assert!(!resolver.has_permission(user, perm::USERS_INFO).await);
        assert_eq!(store.row_count(warden_store::schema::USER_PERMISSIONS), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let (store, resolver) = resolver();
        let user = test_user_id();
        resolver
            .grant_role(user, "helper", Actor::System, None)
            .await
            .unwrap();
        assert!(resolver.has_permission(user, perm::USERS_INFO).await);

        store.set_failing(true);
        assert!(resolver.revoke_role(user, "helper", Actor::System).await.is_err());
        // Cached grant survives the failed revocation
        assert!(resolver.has_permission(user, perm::USERS_INFO).await);
    }

    #[tokio::test]
    async fn test_invalid_permission_name() {
        let (_store, resolver) = resolver();
        let err = resolver
            .grant_user_permission(test_user_id(), "bad name", true, Actor::System, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::InvalidPermission(_)));
    }
}
