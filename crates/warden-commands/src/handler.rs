//! Handler traits and the loadable command units built from them.

use crate::context::CommandContext;
use crate::error::CommandResult;
use crate::options::OptionSpec;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Reply produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Text shown to the invoker.
    pub content: String,
    /// Whether only the invoker sees the reply.
    pub ephemeral: bool,
}

impl CommandReply {
    /// A reply visible in the channel.
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    /// A reply visible to the invoker only.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// The single handler interface the dispatcher calls.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command.
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply>;
}

/// Older handler shape that only produces text.
///
/// Wrapped into a [`CommandHandler`] by [`RunAdapter`] when loaded.
#[async_trait]
pub trait LegacyRun: Send + Sync {
    /// Runs the command and returns the reply text.
    async fn run(&self, ctx: &CommandContext) -> CommandResult<String>;
}

/// Presents a [`LegacyRun`] unit as a [`CommandHandler`].
pub struct RunAdapter {
    inner: Arc<dyn LegacyRun>,
}

impl RunAdapter {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn LegacyRun>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CommandHandler for RunAdapter {
    async fn execute(&self, ctx: &CommandContext) -> CommandResult<CommandReply> {
        self.inner.run(ctx).await.map(CommandReply::public)
    }
}

/// A command unit as offered for loading.
///
/// Units are checked structurally when loaded: a unit needs a name and at
/// least one of `execute` or `run`. When both are present `execute` wins.
#[derive(Clone, Default)]
pub struct CommandDefinition {
    /// Unique command name.
    pub name: Option<String>,
    /// Help text.
    pub description: String,
    /// Cooldown after a successful run; the configured default when `None`.
    pub cooldown: Option<Duration>,
    /// Accepted options.
    pub options: Vec<OptionSpec>,
    /// Permission the invoker must hold.
    pub required_permission: Option<String>,
    /// Typed entry point.
    pub execute: Option<Arc<dyn CommandHandler>>,
    /// Legacy entry point.
    pub run: Option<Arc<dyn LegacyRun>>,
}

impl CommandDefinition {
    /// A unit named `name` with no entry point yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the help text.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the cooldown.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Declares an option.
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    /// Requires `permission` to invoke.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    /// Sets the typed entry point.
    pub fn execute(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.execute = Some(Arc::new(handler));
        self
    }

    /// Sets the legacy entry point.
    pub fn run(mut self, handler: impl LegacyRun + 'static) -> Self {
        self.run = Some(Arc::new(handler));
        self
    }

    /// The entry point as a typed handler, adapting a legacy unit.
    pub(crate) fn handler(&self) -> Option<Arc<dyn CommandHandler>> {
        match (&self.execute, &self.run) {
            (Some(execute), _) => Some(Arc::clone(execute)),
            (None, Some(run)) => Some(Arc::new(RunAdapter::new(Arc::clone(run)))),
            (None, None) => None,
        }
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("cooldown", &self.cooldown)
            .field("options", &self.options)
            .field("required_permission", &self.required_permission)
            .field("execute", &self.execute.is_some())
            .field("run", &self.run.is_some())
            .finish()
    }
}

/// Units of one category.
#[derive(Debug, Clone, Default)]
pub struct CommandSource {
    /// Category name, used by the help index.
    pub category: String,
    /// Units to load.
    pub definitions: Vec<CommandDefinition>,
}

impl CommandSource {
    /// A category with `definitions`.
    pub fn new(category: impl Into<String>, definitions: Vec<CommandDefinition>) -> Self {
        Self {
            category: category.into(),
            definitions,
        }
    }
}
