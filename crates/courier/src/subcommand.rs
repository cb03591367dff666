//! Named command groups.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::argument::ArgumentRegistry;
use crate::context::Context;
use crate::error::ConfigurationError;
use crate::flags::{Flags, matches_name, parse_flags};
use crate::registrar::{self, Command, CommandSet, Inject};

/// The commands of one handler object.
///
/// The root handler of a router is a nameless `Subcommand`; every other
/// handler is reached through its name as the first token of a message.
pub struct Subcommand {
    name: String,
    flags: Flags,
    description: Option<String>,
    commands: Vec<Command>,
    handler: Arc<dyn Any + Send + Sync>,
}

impl Subcommand {
    /// Registers `handler` as the nameless root group.
    pub(crate) fn root<H: CommandSet>(
        handler: H,
        ctx: &Arc<Context>,
        registry: &ArgumentRegistry,
    ) -> Result<Self, ConfigurationError> {
        let description = handler.self_description();
        let registered = registrar::register(handler, ctx, registry)?;

        Ok(Self {
            name: String::new(),
            flags: Flags::NONE,
            description,
            commands: registered.commands,
            handler: registered.handler,
        })
    }

    /// Registers `handler` as a named group.
    ///
    /// The name is the handler's self-given name, or its type name. Flags of
    /// both are combined.
    pub(crate) fn named<H: CommandSet>(
        handler: H,
        ctx: &Arc<Context>,
        registry: &ArgumentRegistry,
    ) -> Result<Self, ConfigurationError> {
        let (type_flags, type_name) = parse_flags(H::TYPE_NAME);
        let self_name = handler.self_name();

        let (flags, clean) = match &self_name {
            Some(given) => {
                let (given_flags, given_name) = parse_flags(given);
                (type_flags | given_flags, given_name)
            }
            None => (type_flags, type_name),
        };
        if clean.is_empty() {
            return Err(ConfigurationError::EmptyName {
                identifier: self_name.unwrap_or_else(|| H::TYPE_NAME.to_owned()),
            });
        }
        let name = if flags.is_raw() {
            clean.to_owned()
        } else {
            clean.to_lowercase()
        };

        let description = handler.self_description();
        let registered = registrar::register(handler, ctx, registry)?;
        debug!(
            subcommand = %name,
            handler = <H as Inject>::TYPE_NAME,
            commands = registered.commands.len(),
            "subcommand registered"
        );

        Ok(Self {
            name,
            flags,
            description,
            commands: registered.commands,
            handler: registered.handler,
        })
    }

    /// Returns the name, empty for the root group.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the commands in registration order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the handler object, if it is an `H`.
    pub fn handler<H: CommandSet>(&self) -> Option<Arc<H>> {
        Arc::clone(&self.handler).downcast::<H>().ok()
    }

    /// Returns `true` if `token` selects this group.
    pub fn matches(&self, token: &str) -> bool {
        matches_name(self.flags, &self.name, token)
    }

    /// Finds the message command selected by `token`.
    pub fn find(&self, token: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.event_kind().is_message() && c.matches(token))
    }
}

impl fmt::Debug for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subcommand")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}
