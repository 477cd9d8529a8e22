//! Loaded, immutable command descriptors.

use crate::handler::CommandHandler;
use crate::options::OptionSpec;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A command accepted by the registry.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Unique name.
    pub name: String,
    /// Help text.
    pub description: String,
    /// Category the command was loaded from.
    pub category: String,
    /// Declared cooldown, if any.
    pub cooldown: Option<Duration>,
    /// Accepted options.
    pub options: Vec<OptionSpec>,
    /// Permission the invoker must hold.
    pub required_permission: Option<String>,
    /// Entry point.
    pub handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("cooldown", &self.cooldown)
            .field("options", &self.options)
            .field("required_permission", &self.required_permission)
            .finish_non_exhaustive()
    }
}
