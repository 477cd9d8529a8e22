//! Command registry and category index.

use crate::descriptor::CommandDescriptor;
use crate::handler::CommandSource;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name and help text of a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    /// Command name.
    pub name: String,
    /// Help text.
    pub description: String,
}

/// Registered commands grouped by category, shared with the `help` command.
pub type CategoryIndex = Arc<RwLock<BTreeMap<String, Vec<CommandSummary>>>>;

/// Registry of loaded commands.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandDescriptor>>,
    index: CategoryIndex,
}

impl CommandRegistry {
    /// Create a new command registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the category index; stays current as sources are loaded.
    pub fn category_index(&self) -> CategoryIndex {
        Arc::clone(&self.index)
    }

    /// Loads every unit of `sources`. Returns how many were accepted.
    ///
    /// Units without a name, without an entry point, or reusing a loaded
    /// name are logged and skipped; loading never fails.
    pub fn load_all(&mut self, sources: impl IntoIterator<Item = CommandSource>) -> usize {
        let mut accepted = 0;

        for source in sources {
            for definition in source.definitions {
                let Some(name) = definition.name.clone().filter(|n| !n.trim().is_empty()) else {
                    warn!(category = %source.category, "Skipping command without a name");
                    continue;
                };
                let Some(handler) = definition.handler() else {
                    warn!(category = %source.category, command = %name, "Skipping command without an entry point");
                    continue;
                };
                if self.commands.contains_key(&name) {
                    warn!(category = %source.category, command = %name, "Skipping duplicate command");
                    continue;
                }

                let descriptor = CommandDescriptor {
                    name: name.clone(),
                    description: definition.description,
                    category: source.category.clone(),
                    cooldown: definition.cooldown,
                    options: definition.options,
                    required_permission: definition.required_permission,
                    handler,
                };
                self.index
                    .write()
                    .entry(source.category.clone())
                    .or_default()
                    .push(CommandSummary {
                        name: name.clone(),
                        description: descriptor.description.clone(),
                    });
                self.commands.insert(name.clone(), Arc::new(descriptor));
                debug!(category = %source.category, command = %name, "Registered command");
                accepted += 1;
            }
        }

        info!(accepted, total = self.commands.len(), "Loaded commands");
        accepted
    }

    /// Descriptor of `name`.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.commands.get(name).cloned()
    }

    /// Every descriptor, sorted by name.
    pub fn descriptors(&self) -> Vec<Arc<CommandDescriptor>> {
        let mut all: Vec<_> = self.commands.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Command names of `category`, in load order.
    pub fn category(&self, category: &str) -> Vec<String> {
        self.index
            .read()
            .get(category)
            .map(|commands| commands.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContext;
    use crate::error::CommandResult;
    use crate::handler::{CommandDefinition, CommandHandler, CommandReply, LegacyRun};
    use async_trait::async_trait;

    struct Pong;

    #[async_trait]
    impl CommandHandler for Pong {
        async fn execute(&self, _ctx: &CommandContext) -> CommandResult<CommandReply> {
            Ok(CommandReply::public("pong"))
        }
    }

    struct LegacyPong;

    #[async_trait]
    impl LegacyRun for LegacyPong {
        async fn run(&self, _ctx: &CommandContext) -> CommandResult<String> {
            Ok("legacy pong".into())
        }
    }

    #[test]
    fn test_load_all_filters_invalid_units() {
        let mut registry = CommandRegistry::new();
        let accepted = registry.load_all([
            CommandSource::new(
                "general",
                vec![
                    CommandDefinition::new("ping").execute(Pong),
                    CommandDefinition::new("legacy").run(LegacyPong),
                    CommandDefinition::new("hollow"),
                    CommandDefinition::default().execute(Pong),
                ],
            ),
            CommandSource::new("extra", vec![CommandDefinition::new("ping").run(LegacyPong)]),
        ]);

        assert_eq!(accepted, 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("hollow").is_none());
        assert_eq!(registry.get("ping").unwrap().category, "general");
        assert_eq!(registry.category("general"), vec!["ping", "legacy"]);
        assert!(registry.category("extra").is_empty());
    }

    #[test]
    fn test_index_handle_sees_later_loads() {
        let mut registry = CommandRegistry::new();
        let index = registry.category_index();
        assert!(index.read().is_empty());

        registry.load_all([CommandSource::new("general", vec![CommandDefinition::new("ping").execute(Pong)])]);
        assert_eq!(index.read()["general"][0].name, "ping");
    }
}
