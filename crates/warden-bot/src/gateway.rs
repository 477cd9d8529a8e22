//! Moderation gateway backed by the Discord HTTP API and cache.

use async_trait::async_trait;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use serenity::{Cache, CreateMessage, EditMember, Http, Permissions, RoleId, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use warden_common::{ChannelId, GuildId, MessageId, UserId};
use warden_moderation::{Action, GatewayError, ModerationGateway};

/// Applies moderation actions through Discord.
pub struct SerenityGateway {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityGateway {
    /// Creates a gateway from the client's HTTP handle and cache.
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    /// Permissions and top role position of `user` in `guild`, from the cache.
    fn standing_of(guild: &serenity::Guild, user: serenity::UserId) -> Option<(Permissions, u16)> {
        let member = guild.members.get(&user)?;
        let everyone = RoleId::new(guild.id.get());
        let mut permissions = guild
            .roles
            .get(&everyone)
            .map_or(Permissions::empty(), |role| role.permissions);
        let mut top = 0;
        for role in member.roles.iter().filter_map(|id| guild.roles.get(id)) {
            permissions |= role.permissions;
            top = top.max(role.position);
        }
        Some((permissions, top))
    }
}

/// Discord permission needed to apply `action`.
pub fn required_permission(action: Action) -> Permissions {
    match action {
        Action::Warning => Permissions::empty(),
        Action::Timeout => Permissions::MODERATE_MEMBERS,
        Action::Kick => Permissions::KICK_MEMBERS,
        Action::Ban => Permissions::BAN_MEMBERS,
    }
}

/// Whether a bot with `bot_permissions` and top role `bot_top` may apply
/// `action` to a member whose top role is `target_top`.
pub fn has_standing(
    action: Action,
    bot_permissions: Permissions,
    bot_top: u16,
    target_top: u16,
    target_is_owner: bool,
) -> bool {
    if action == Action::Warning {
        return true;
    }
    if target_is_owner {
        return false;
    }
    let permitted = bot_permissions.contains(Permissions::ADMINISTRATOR)
        || bot_permissions.contains(required_permission(action));
    permitted && bot_top > target_top
}

fn gateway_error(context: &str, err: serenity::Error) -> GatewayError {
    let status = match &err {
        serenity::Error::Http(http) => http.status_code().map(|code| code.as_u16()),
        _ => None,
    };
    let message = format!("{context}: {err}");
    match status {
        Some(403) => GatewayError::Forbidden(message),
        Some(404) => GatewayError::NotFound(message),
        _ => GatewayError::Request(message),
    }
}

#[async_trait]
impl ModerationGateway for SerenityGateway {
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), GatewayError> {
        serenity::ChannelId::new(channel.get())
            .delete_message(&self.http, serenity::MessageId::new(message.get()))
            .await
            .map_err(|e| gateway_error("delete message", e))
    }

    async fn send_private_notice(&self, user: UserId, content: String) -> Result<(), GatewayError> {
        serenity::UserId::new(user.get())
            .direct_message(&self.http, CreateMessage::new().content(content))
            .await
            .map(|_| ())
            .map_err(|e| gateway_error("send private notice", e))
    }

    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: String,
    ) -> Result<(), GatewayError> {
        let secs = i64::try_from(duration.as_secs())
            .map_err(|_| GatewayError::Request("timeout duration out of range".into()))?;
        let until = Timestamp::from_unix_timestamp(Utc::now().timestamp() + secs)
            .map_err(|e| GatewayError::Request(format!("invalid timeout end: {e}")))?;

        serenity::GuildId::new(guild.get())
            .edit_member(
                &self.http,
                serenity::UserId::new(user.get()),
                EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(&reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| gateway_error("timeout member", e))
    }

    async fn kick_member(&self, guild: GuildId, user: UserId, reason: String) -> Result<(), GatewayError> {
        serenity::GuildId::new(guild.get())
            .kick_with_reason(&self.http, serenity::UserId::new(user.get()), &reason)
            .await
            .map_err(|e| gateway_error("kick member", e))
    }

    async fn ban_member(&self, guild: GuildId, user: UserId, reason: String) -> Result<(), GatewayError> {
        serenity::GuildId::new(guild.get())
            .ban_with_reason(&self.http, serenity::UserId::new(user.get()), 0, &reason)
            .await
            .map_err(|e| gateway_error("ban member", e))
    }

    async fn can_sanction(&self, guild: GuildId, user: UserId, action: Action) -> bool {
        if action == Action::Warning {
            return true;
        }
        let bot_id = self.cache.current_user().id;
        let target = serenity::UserId::new(user.get());

        let Some(guild) = self.cache.guild(serenity::GuildId::new(guild.get())) else {
            warn!(%guild, "Guild not cached; cannot verify moderation standing");
            return false;
        };
        let Some((bot_permissions, bot_top)) = Self::standing_of(&guild, bot_id) else {
            warn!(guild_id = %guild.id, "Bot member not cached; cannot verify moderation standing");
            return false;
        };
        // Uncached members only hold @everyone
        let target_top = Self::standing_of(&guild, target).map_or(0, |(_, top)| top);

        let allowed = has_standing(action, bot_permissions, bot_top, target_top, guild.owner_id == target);
        debug!(guild_id = %guild.id, %user, %action, allowed, "Checked moderation standing");
        allowed
    }
}

impl std::fmt::Debug for SerenityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityGateway").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_needs_no_standing() {
        assert!(has_standing(Action::Warning, Permissions::empty(), 0, 10, true));
    }

    #[test]
    fn test_standing_requires_permission_and_rank() {
        let kick = Permissions::KICK_MEMBERS;
        assert!(has_standing(Action::Kick, kick, 5, 2, false));
        assert!(!has_standing(Action::Kick, kick, 2, 2, false));
        assert!(!has_standing(Action::Ban, kick, 5, 2, false));
        assert!(has_standing(Action::Ban, Permissions::ADMINISTRATOR, 5, 2, false));
        assert!(!has_standing(Action::Timeout, Permissions::ADMINISTRATOR, 5, 2, true));
    }

    #[test]
    fn test_required_permissions() {
        assert_eq!(required_permission(Action::Timeout), Permissions::MODERATE_MEMBERS);
        assert_eq!(required_permission(Action::Ban), Permissions::BAN_MEMBERS);
    }
}
