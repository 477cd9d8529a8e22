//! Role types and the permissions each role carries.

use crate::error::PermissionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission names used by the built-in commands.
pub mod perm {
    /// Grant and revoke roles.
    pub const ROLES_MANAGE: &str = "roles.manage";
    /// Grant and revoke per-user overrides.
    pub const PERMISSIONS_MANAGE: &str = "permissions.manage";
    /// Inspect another identity's roles and permissions.
    pub const USERS_INFO: &str = "users.info";
    /// Edit the guild moderation configuration.
    pub const MODERATION_CONFIG: &str = "moderation.config";
    /// Manage the moderation whitelist.
    pub const MODERATION_WHITELIST: &str = "moderation.whitelist";
    /// Read moderation statistics.
    pub const MODERATION_STATS: &str = "moderation.stats";
    /// Read offender records and moderation logs.
    pub const MODERATION_VIEW_LOGS: &str = "moderation.view_logs";
    /// Run moderation commands.
    pub const COMMANDS_MODERATION: &str = "commands.moderation";

    /// Every permission name known to the bot.
    pub const ALL: &[&str] = &[
        ROLES_MANAGE,
        PERMISSIONS_MANAGE,
        USERS_INFO,
        MODERATION_CONFIG,
        MODERATION_WHITELIST,
        MODERATION_STATS,
        MODERATION_VIEW_LOGS,
        COMMANDS_MODERATION,
    ];
}

const MODERATOR_PERMISSIONS: &[&str] = &[
    perm::MODERATION_CONFIG,
    perm::MODERATION_WHITELIST,
    perm::MODERATION_STATS,
    perm::MODERATION_VIEW_LOGS,
    perm::USERS_INFO,
    perm::COMMANDS_MODERATION,
];

const HELPER_PERMISSIONS: &[&str] = &[
    perm::MODERATION_VIEW_LOGS,
    perm::MODERATION_STATS,
    perm::USERS_INFO,
];

/// Roles an identity can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Holds every permission.
    Admin,
    /// Moderation management.
    Moderator,
    /// Read-only moderation support.
    Helper,
}

impl RoleType {
    /// Every role type.
    pub const ALL: [RoleType; 3] = [Self::Admin, Self::Moderator, Self::Helper];

    /// Stored name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Helper => "helper",
        }
    }

    /// The permission table of this role. Admin lists every known permission.
    pub const fn permissions(self) -> &'static [&'static str] {
        match self {
            Self::Admin => perm::ALL,
            Self::Moderator => MODERATOR_PERMISSIONS,
            Self::Helper => HELPER_PERMISSIONS,
        }
    }

    /// Whether this role carries `permission`.
    pub fn grants(self, permission: &str) -> bool {
        match self {
            Self::Admin => true,
            _ => self.permissions().contains(&permission),
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "helper" => Ok(Self::Helper),
            _ => Err(PermissionError::InvalidRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!("Moderator".parse::<RoleType>().unwrap(), RoleType::Moderator);
        assert!(matches!(
            "owner".parse::<RoleType>(),
            Err(PermissionError::InvalidRole(name)) if name == "owner"
        ));
    }

    #[test]
    fn test_role_tables() {
        assert!(RoleType::Admin.grants("bot.admin"));
        assert!(RoleType::Moderator.grants(perm::MODERATION_WHITELIST));
        assert!(!RoleType::Moderator.grants(perm::ROLES_MANAGE));
        assert!(RoleType::Helper.grants(perm::MODERATION_STATS));
        assert!(!RoleType::Helper.grants(perm::MODERATION_CONFIG));
    }
}
