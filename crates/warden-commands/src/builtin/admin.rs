//! Role and permission administration.

use super::{describe_expiry, expiry_in_days, BuiltinServices};
use crate::context::CommandContext;
use crate::error::CommandResult;
use crate::handler::{CommandDefinition, CommandHandler, CommandReply, CommandSource};
use crate::options::{OptionKind, OptionSpec};
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use warden_permissions::{perm, Actor, PermissionResolver};

/// Category name.
pub const CATEGORY: &str = "admin";

pub(super) fn source(services: &BuiltinServices) -> CommandSource {
    let resolver = &services.resolver;
    let user = || OptionSpec::required("user", OptionKind::User, "Target member");
    let role = || OptionSpec::required("role", OptionKind::String, "admin, moderator or helper");
    let permission = || OptionSpec::required("permission", OptionKind::String, "Permission name");
    let days = || OptionSpec::optional("days", OptionKind::Integer, "Expire after this many days");

    CommandSource::new(
        CATEGORY,
        vec![
            CommandDefinition::new("role-grant")
                .description("Grants a role to a member")
                .permission(perm::ROLES_MANAGE)
                .option(user())
                .option(role())
                .option(days())
                .execute(GrantRole {
                    resolver: Arc::clone(resolver),
                }),
            CommandDefinition::new("role-revoke")
                .description("Revokes a role from a member")
                .permission(perm::ROLES_MANAGE)
                .option(user())
                .option(role())
                .execute(RevokeRole {
                    resolver: Arc::clone(resolver),
                }),
            CommandDefinition::new("perm-grant")
                .description("Grants or denies a single permission to a member")
                .permission(perm::PERMISSIONS_MANAGE)
                .option(user())
                .option(permission())
                .option(OptionSpec::optional("granted", OptionKind::Boolean, "false to deny instead"))
                .option(days())
                .option(OptionSpec::optional("reason", OptionKind::String, "Why the override exists"))
                .execute(GrantPermission {
                    resolver: Arc::clone(resolver),
                }),
            CommandDefinition::new("perm-revoke")
                .description("Removes a member's permission override")
                .permission(perm::PERMISSIONS_MANAGE)
                .option(user())
                .option(permission())
                .execute(RevokePermission {
                    resolver: Arc::clone(resolver),
                }),
            CommandDefinition::new("userinfo")
                .description("Shows a member's roles and permissions")
                .permission(perm::USERS_INFO)
                .option(OptionSpec::optional("user", OptionKind::User, "Member to inspect, yourself by default"))
                .execute(ShowUserInfo {
                    resolver: Arc::clone(resolver),
                }),
        ],
    )
}

/// `role-grant`.
pub struct GrantRole {
    resolver: Arc<PermissionResolver>,
}

#[async_trait]
impl CommandHandler for GrantRole {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let target = ctx.options.require_user("user")?;
        let role = ctx.options.require_str("role")?.to_lowercase();
        let expires_at = expiry_in_days(ctx.options.integer("days"))?;

        let grant = self
            .resolver
            .grant_role(target, &role, Actor::User(ctx.user_id), expires_at)
            .await?;
        Ok(CommandReply::public(format!(
            "Granted **{}** to <@{target}> (expires: {}).",
            grant.role,
            describe_expiry(grant.expires_at)
        )))
    }
}

/// `role-revoke`.
pub struct RevokeRole {
    resolver: Arc<PermissionResolver>,
}

#[async_trait]
impl CommandHandler for RevokeRole {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let target = ctx.options.require_user("user")?;
        let role = ctx.options.require_str("role")?.to_lowercase();

        let removed = self
            .resolver
            .revoke_role(target, &role, Actor::User(ctx.user_id))
            .await?;
        let text = if removed {
            format!("Revoked **{role}** from <@{target}>.")
        } else {
            format!("<@{target}> does not have the **{role}** role.")
        };
        Ok(CommandReply::public(text))
    }
}

/// `perm-grant`.
pub struct GrantPermission {
    resolver: Arc<PermissionResolver>,
}

#[async_trait]
impl CommandHandler for GrantPermission {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let target = ctx.options.require_user("user")?;
        let permission = ctx.options.require_str("permission")?.trim();
        let granted = ctx.options.boolean("granted").unwrap_or(true);
        let expires_at = expiry_in_days(ctx.options.integer("days"))?;
        let reason = ctx.options.str("reason").map(str::to_string);

        let entry = self
            .resolver
            .grant_user_permission(
                target,
                permission,
                granted,
                Actor::User(ctx.user_id),
                expires_at,
                reason,
            )
            .await?;
        let verb = if entry.is_granted { "Granted" } else { "Denied" };
        Ok(CommandReply::public(format!(
            "{verb} `{}` for <@{target}> (expires: {}).",
            entry.permission,
            describe_expiry(entry.expires_at)
        )))
    }
}

/// `perm-revoke`.
pub struct RevokePermission {
    resolver: Arc<PermissionResolver>,
}

#[async_trait]
impl CommandHandler for RevokePermission {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let target = ctx.options.require_user("user")?;
        let permission = ctx.options.require_str("permission")?.trim();

        let removed = self
            .resolver
            .revoke_user_permission(target, permission, Actor::User(ctx.user_id))
            .await?;
        let text = if removed {
            format!("Removed the `{permission}` override of <@{target}>.")
        } else {
            format!("<@{target}> has no `{permission}` override.")
        };
        Ok(CommandReply::public(text))
    }
}

/// `userinfo`.
pub struct ShowUserInfo {
    resolver: Arc<PermissionResolver>,
}

#[async_trait]
impl CommandHandler for ShowUserInfo {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        let target = ctx.options.user("user").unwrap_or(ctx.user_id);
        let info = self.resolver.get_user_info(target).await?;

        let mut text = format!("**User info for <@{target}>**\n");
        if info.is_super_admin {
            text.push_str("Super-admin: yes\n");
        }

        text.push_str("\n__Roles__\n");
        if info.roles.is_empty() {
            text.push_str("none\n");
        }
        for grant in &info.roles {
            let _ = writeln!(
                text,
                "{} (by {}, expires: {})",
                grant.role,
                grant.granted_by,
                describe_expiry(grant.expires_at)
            );
        }

        if !info.overrides.is_empty() {
            text.push_str("\n__Overrides__\n");
            for entry in &info.overrides {
                let sign = if entry.is_granted { "+" } else { "-" };
                let _ = writeln!(
                    text,
                    "{sign}`{}` (expires: {})",
                    entry.permission,
                    describe_expiry(entry.expires_at)
                );
            }
        }

        text.push_str("\n__Effective permissions__\n");
        if info.permissions.is_empty() {
            text.push_str("none\n");
        } else {
            let names: Vec<String> = info.permissions.iter().map(|p| format!("`{p}`")).collect();
            text.push_str(&names.join(", "));
            text.push('\n');
        }
        Ok(CommandReply::ephemeral(text))
    }
}
