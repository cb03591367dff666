//! Turning handler objects into command tables.
//!
//! A handler object implements two traits:
//!
//! - [`Inject`], usually derived, which places the shared context into the
//!   handler's first [`ContextSlot`](crate::ContextSlot) field.
//! - [`CommandSet`], usually generated by `#[commands]`, which describes each
//!   command through a [`Registrar`].
//!
//! The generated code is equivalent to writing the registration by hand:
//!
//! ```rust,ignore
//! impl CommandSet for Dice {
//!     fn register(r: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
//!         r.command::<MessageCreate>("roll")
//!             .description("Rolls a die.")
//!             .arg::<u32>()
//!             .invoke(|this, event, mut args| {
//!                 Box::pin(async move {
//!                     let m = event.downcast_ref::<MessageCreate>().unwrap();
//!                     let sides = args.take::<u32>()?;
//!                     this.roll(m, sides).await.map_err(Into::into)
//!                 })
//!             })?;
//!         Ok(())
//!     }
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::trace;

use courier_core::{BoxError, BoxedEvent, Event, EventKind};

use crate::argument::{ArgumentRegistry, ArgumentType, Arguments, Coercer, ManualCoercer, TokenCoercer};
use crate::context::Context;
use crate::error::ConfigurationError;
use crate::flags::{Flags, names_overlap, parse_flags};

/// Places the shared context into a handler object.
pub trait Inject {
    /// Name of the handler type, used to name subcommands.
    const TYPE_NAME: &'static str;

    /// Stores `ctx` in the first context slot.
    ///
    /// Returns `false` if the handler has no slot.
    fn inject_context(&mut self, ctx: &Arc<Context>) -> bool;
}

/// A handler object: a named group of commands.
pub trait CommandSet: Inject + Send + Sync + Sized + 'static {
    /// Name to register the handler under as a subcommand.
    ///
    /// Defaults to the type name. Directive markers are honoured.
    fn self_name(&self) -> Option<String> {
        None
    }

    /// Description of the handler.
    fn self_description(&self) -> Option<String> {
        None
    }

    /// Declares the commands of this handler.
    fn register(registrar: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError>;
}

/// Future returned by a command invocation.
pub type CommandFuture = BoxFuture<'static, Result<(), BoxError>>;

type HandlerFn<H> = Arc<dyn Fn(Arc<H>, BoxedEvent, Arguments) -> CommandFuture + Send + Sync>;
type BoundFn = Arc<dyn Fn(BoxedEvent, Arguments) -> CommandFuture + Send + Sync>;

// ============================================================================
// Command
// ============================================================================

/// How a message command receives its arguments.
#[derive(Debug, Clone)]
pub enum ArgumentPlan {
    /// One coercer per token after the command name.
    Tokens(Vec<TokenCoercer>),
    /// A single whole-line argument receiving every token.
    Manual(ManualCoercer),
}

impl ArgumentPlan {
    /// Returns the number of declared arguments.
    pub fn len(&self) -> usize {
        match self {
            Self::Tokens(coercers) => coercers.len(),
            Self::Manual(_) => 1,
        }
    }

    /// Returns `true` if the command takes no arguments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One registered command.
pub struct Command {
    name: String,
    identifier: String,
    flags: Flags,
    description: Option<String>,
    event: EventKind,
    plan: ArgumentPlan,
    invoke: BoundFn,
}

impl Command {
    /// Returns the name the command is matched by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identifier the command was declared with.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the event kind the command handles.
    pub fn event_kind(&self) -> EventKind {
        self.event
    }

    pub fn plan(&self) -> &ArgumentPlan {
        &self.plan
    }

    /// Returns `true` if `token` selects this command.
    pub fn matches(&self, token: &str) -> bool {
        crate::flags::matches_name(self.flags, &self.name, token)
    }

    pub(crate) fn call(&self, event: BoxedEvent, args: Arguments) -> CommandFuture {
        (self.invoke)(event, args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("event", &self.event)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registrar
// ============================================================================

struct Pending<H> {
    name: String,
    identifier: String,
    flags: Flags,
    description: Option<String>,
    event: EventKind,
    plan: ArgumentPlan,
    invoke: HandlerFn<H>,
}

/// Collects the commands of one handler type.
pub struct Registrar<'a, H> {
    registry: &'a ArgumentRegistry,
    pending: Vec<Pending<H>>,
}

impl<'a, H: CommandSet> Registrar<'a, H> {
    pub(crate) fn new(registry: &'a ArgumentRegistry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
        }
    }

    /// Starts declaring a command handling events of type `E`.
    ///
    /// `identifier` may carry directive markers, see [`crate::flags`].
    pub fn command<E: Event>(&mut self, identifier: &str) -> CommandBuilder<'_, 'a, H, E> {
        CommandBuilder {
            registrar: self,
            identifier: identifier.to_owned(),
            flags: Flags::NONE,
            description: None,
            args: Vec::new(),
            _event: PhantomData,
        }
    }

    /// Returns the number of commands declared so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn finish(self, handler: &Arc<H>) -> Vec<Command> {
        self.pending
            .into_iter()
            .map(|p| {
                let handler = Arc::clone(handler);
                let invoke = p.invoke;
                Command {
                    name: p.name,
                    identifier: p.identifier,
                    flags: p.flags,
                    description: p.description,
                    event: p.event,
                    plan: p.plan,
                    invoke: Arc::new(move |event: BoxedEvent, args: Arguments| {
                        invoke(Arc::clone(&handler), event, args)
                    }),
                }
            })
            .collect()
    }
}

/// Builder for one command, returned by [`Registrar::command`].
#[must_use = "a command is only registered once `invoke` is called"]
pub struct CommandBuilder<'r, 'a, H, E> {
    registrar: &'r mut Registrar<'a, H>,
    identifier: String,
    flags: Flags,
    description: Option<String>,
    args: Vec<ArgumentType>,
    _event: PhantomData<fn(E)>,
}

impl<H: CommandSet, E: Event> CommandBuilder<'_, '_, H, E> {
    /// Restricts the command to administrators.
    pub fn admin(mut self) -> Self {
        self.flags |= Flags::ADMIN_ONLY;
        self
    }

    /// Keeps the identifier's casing and matches it exactly.
    pub fn raw(mut self) -> Self {
        self.flags |= Flags::RAW;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares the next argument.
    pub fn arg<T: 'static>(mut self) -> Self {
        self.args.push(ArgumentType::of::<T>());
        self
    }

    /// Finishes the command with the function that runs it.
    ///
    /// Argument types are resolved here; an unknown type fails with
    /// [`ConfigurationError::UnresolvedArgument`].
    pub fn invoke<F>(self, invoke: F) -> Result<(), ConfigurationError>
    where
        F: Fn(Arc<H>, BoxedEvent, Arguments) -> CommandFuture + Send + Sync + 'static,
    {
        let (directives, clean) = parse_flags(&self.identifier);
        let flags = self.flags | directives;
        if clean.is_empty() {
            return Err(ConfigurationError::EmptyName {
                identifier: self.identifier,
            });
        }
        let name = if flags.is_raw() {
            clean.to_owned()
        } else {
            clean.to_lowercase()
        };

        let event = EventKind::of::<E>();
        if !event.is_message() && !self.args.is_empty() {
            return Err(ConfigurationError::EventArguments {
                command: name,
                event: event.type_name(),
            });
        }

        let plan = resolve_plan(self.registrar.registry, &name, &self.args)?;

        if self
            .registrar
            .pending
            .iter()
            .any(|p| {
                p.event == event
                    && names_overlap((p.flags, p.name.as_str()), (flags, name.as_str()))
            })
        {
            return Err(ConfigurationError::DuplicateCommand {
                handler: H::TYPE_NAME,
                name,
            });
        }

        trace!(handler = H::TYPE_NAME, command = %name, ?flags, "command declared");
        self.registrar.pending.push(Pending {
            name,
            identifier: self.identifier,
            flags,
            description: self.description,
            event,
            plan,
            invoke: Arc::new(invoke),
        });
        Ok(())
    }
}

fn resolve_plan(
    registry: &ArgumentRegistry,
    command: &str,
    args: &[ArgumentType],
) -> Result<ArgumentPlan, ConfigurationError> {
    let mut tokens = Vec::with_capacity(args.len());

    for (position, ty) in args.iter().enumerate() {
        let coercer = registry
            .resolve(*ty)
            .ok_or_else(|| ConfigurationError::UnresolvedArgument {
                command: command.to_owned(),
                type_name: ty.name(),
            })?;

        match coercer {
            Coercer::Token(coercer) => tokens.push(coercer),
            Coercer::Manual(manual) if position == 0 && args.len() == 1 => {
                return Ok(ArgumentPlan::Manual(manual));
            }
            Coercer::Manual(_) => {
                return Err(ConfigurationError::ManualNotSole {
                    command: command.to_owned(),
                    type_name: ty.name(),
                });
            }
        }
    }

    Ok(ArgumentPlan::Tokens(tokens))
}

/// A handler after registration.
pub(crate) struct Registered<H> {
    pub(crate) handler: Arc<H>,
    pub(crate) commands: Vec<Command>,
}

impl<H> fmt::Debug for Registered<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registered")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

/// Collects the commands of `handler` and injects `ctx` into it.
pub(crate) fn register<H: CommandSet>(
    mut handler: H,
    ctx: &Arc<Context>,
    registry: &ArgumentRegistry,
) -> Result<Registered<H>, ConfigurationError> {
    let mut registrar = Registrar::new(registry);
    H::register(&mut registrar)?;

    if !handler.inject_context(ctx) {
        return Err(ConfigurationError::MissingContextSlot {
            handler: H::TYPE_NAME,
        });
    }

    let handler = Arc::new(handler);
    let commands = registrar.finish(&handler);
    Ok(Registered { handler, commands })
}
