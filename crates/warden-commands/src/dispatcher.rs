//! Invocation dispatch with cooldowns, access control and fault containment.

use crate::context::{CommandContext, Invocation};
use crate::cooldown::CooldownManager;
use crate::descriptor::CommandDescriptor;
use crate::handler::CommandReply;
use crate::inflight::InFlightTracker;
use crate::options::CommandOptions;
use crate::registry::CommandRegistry;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;
use warden_common::format_duration;
use warden_config::CommandsConfig;
use warden_permissions::PermissionCheck;

/// Notice shown when a handler fails for a reason the invoker cannot fix.
pub const GENERIC_FAILURE: &str = "Something went wrong while running this command.";

/// Result of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion.
    Completed(CommandReply),
    /// No command has that name.
    UnknownCommand(String),
    /// The invoker must wait before running the command again.
    OnCooldown {
        /// Time left.
        remaining: Duration,
    },
    /// An earlier invocation by the same user has not finished.
    AlreadyRunning,
    /// The options did not match the command's schema.
    InvalidOptions(String),
    /// The invoker lacks the required permission.
    MissingPermission(String),
    /// The handler returned an error or panicked.
    Failed {
        /// Id of the invocation, also present in the logs.
        invocation_id: Uuid,
        /// Notice shown to the invoker.
        notice: String,
    },
}

impl DispatchOutcome {
    /// The reply to show for this outcome.
    pub fn reply(&self) -> CommandReply {
        match self {
            Self::Completed(reply) => reply.clone(),
            Self::UnknownCommand(name) => CommandReply::ephemeral(format!("Unknown command `{name}`.")),
            Self::OnCooldown { remaining } => CommandReply::ephemeral(format!(
                "This command is on cooldown. Try again in {}.",
                format_duration(*remaining)
            )),
            Self::AlreadyRunning => {
                CommandReply::ephemeral("This command is still running for you. Please wait for it to finish.")
            }
            Self::InvalidOptions(message) => CommandReply::ephemeral(message.clone()),
            Self::MissingPermission(permission) => CommandReply::ephemeral(format!(
                "You need the `{permission}` permission to use this command."
            )),
            Self::Failed { notice, .. } => CommandReply::ephemeral(notice.clone()),
        }
    }

    /// Whether the handler ran successfully.
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Routes invocations to registered handlers.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    permissions: Arc<dyn PermissionCheck>,
    cooldowns: CooldownManager,
    in_flight: InFlightTracker,
    settings: CommandsConfig,
}

impl Dispatcher {
    /// Creates a dispatcher over a loaded registry.
    pub fn new(
        registry: Arc<CommandRegistry>,
        permissions: Arc<dyn PermissionCheck>,
        settings: CommandsConfig,
    ) -> Self {
        Self {
            registry,
            permissions,
            cooldowns: CooldownManager::new(),
            in_flight: InFlightTracker::new(),
            settings,
        }
    }

    /// The registry commands are looked up in.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Cooldown state.
    pub fn cooldowns(&self) -> &CooldownManager {
        &self.cooldowns
    }

    /// Cooldown applied after a successful run of `descriptor`.
    ///
    /// A configured override wins over the command's own cooldown, which
    /// wins over the configured default.
    pub fn cooldown_for(&self, descriptor: &CommandDescriptor) -> Duration {
        self.settings
            .cooldown_for(&descriptor.name)
            .or(descriptor.cooldown)
            .unwrap_or_else(|| Duration::from_millis(self.settings.default_cooldown_ms))
    }

    /// Runs `invocation`. Never fails and never panics; every problem is
    /// reported through the returned outcome.
    pub async fn dispatch(&self, invocation: Invocation) -> DispatchOutcome {
        let Some(descriptor) = self.registry.get(&invocation.command) else {
            debug!(user_id = %invocation.user_id, command = %invocation.command, "Unknown command");
            return DispatchOutcome::UnknownCommand(invocation.command);
        };
        let user_id = invocation.user_id;

        if let Some(remaining) = self.cooldowns.remaining(user_id, &descriptor.name) {
            debug!(%user_id, command = %descriptor.name, remaining_ms = remaining.as_millis() as u64, "Command on cooldown");
            return DispatchOutcome::OnCooldown { remaining };
        }

        let Some(_running) = self.in_flight.try_acquire(user_id, &descriptor.name) else {
            debug!(%user_id, command = %descriptor.name, "Command already running");
            return DispatchOutcome::AlreadyRunning;
        };

        let options = match CommandOptions::normalize(&descriptor.options, &invocation.raw_options) {
            Ok(options) => options,
            Err(e) => return DispatchOutcome::InvalidOptions(e.to_string()),
        };

        if let Some(permission) = &descriptor.required_permission {
            if !self.permissions.has_permission(user_id, permission).await {
                debug!(%user_id, command = %descriptor.name, %permission, "Permission denied");
                return DispatchOutcome::MissingPermission(permission.clone());
            }
        }

        let ctx = CommandContext::new(&invocation, options);
        let span = info_span!(
            "command",
            invocation_id = %ctx.invocation_id,
            user_id = %user_id,
            command = %descriptor.name,
            guild_id = ?ctx.guild_id,
        );
        self.invoke(&descriptor, &ctx).instrument(span).await
    }

    async fn invoke(&self, descriptor: &CommandDescriptor, ctx: &CommandContext) -> DispatchOutcome {
        let result = AssertUnwindSafe(descriptor.handler.execute(ctx))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(reply)) => {
                self.cooldowns
                    .start(ctx.user_id, &descriptor.name, self.cooldown_for(descriptor));
                debug!("Command completed");
                DispatchOutcome::Completed(reply)
            }
            Ok(Err(e)) if e.is_user_facing() => {
                debug!(error = %e, "Command rejected input");
                DispatchOutcome::Failed {
                    invocation_id: ctx.invocation_id,
                    notice: e.to_string(),
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Command failed");
                DispatchOutcome::Failed {
                    invocation_id: ctx.invocation_id,
                    notice: GENERIC_FAILURE.to_string(),
                }
            }
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "Command panicked");
                DispatchOutcome::Failed {
                    invocation_id: ctx.invocation_id,
                    notice: GENERIC_FAILURE.to_string(),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.registry.len())
            .field("cooldowns", &self.cooldowns.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, CommandResult};
    use crate::handler::{CommandDefinition, CommandHandler, CommandSource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use warden_common::UserId;

    struct AllowAll;

    #[async_trait]
    impl PermissionCheck for AllowAll {
        async fn has_permission(&self, _user_id: UserId, _permission: &str) -> bool {
            true
        }
    }

    struct Fails;

    #[async_trait]
    impl CommandHandler for Fails {
        async fn execute(&self, _ctx: &CommandContext) -> CommandResult<CommandReply> {
            Err(CommandError::failed("database exploded"))
        }
    }

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
            Ok(CommandReply::public(ctx.command.clone()))
        }
    }

    fn dispatcher(settings: CommandsConfig) -> Dispatcher {
        let mut registry = CommandRegistry::new();
        registry.load_all([CommandSource::new(
            "test",
            vec![
                CommandDefinition::new("fails").execute(Fails),
                CommandDefinition::new("echo")
                    .cooldown(Duration::from_secs(10))
                    .execute(Echo),
                CommandDefinition::new("plain").execute(Echo),
            ],
        )]);
        Dispatcher::new(Arc::new(registry), Arc::new(AllowAll), settings)
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_cooldown_precedence() {
        let settings = CommandsConfig {
            default_cooldown_ms: 1500,
            cooldown_overrides: HashMap::from([("plain".to_string(), 250)]),
        };
        let dispatcher = dispatcher(settings);
        let registry = Arc::clone(dispatcher.registry());

        let echo = registry.get("echo").unwrap();
        let plain = registry.get("plain").unwrap();
        let fails = registry.get("fails").unwrap();
        assert_eq!(dispatcher.cooldown_for(&echo), Duration::from_secs(10));
        assert_eq!(dispatcher.cooldown_for(&plain), Duration::from_millis(250));
        assert_eq!(dispatcher.cooldown_for(&fails), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let dispatcher = dispatcher(CommandsConfig::default());
        let outcome = dispatcher.dispatch(Invocation::new(UserId(1), "fails")).await;

        match outcome {
            DispatchOutcome::Failed { notice, .. } => assert_eq!(notice, GENERIC_FAILURE),
            other => panic!("unexpected outcome {other:?}"),
        }
        // Failures never start a cooldown
        assert!(dispatcher.cooldowns().is_empty());
    }
}
