//! The router: a root command group plus named subcommands.
//!
//! ```text
//! "~ping"            -> root command `ping`
//! "~admin kick bob"  -> subcommand `admin`, command `kick`, argument "bob"
//! ```
//!
//! Registration takes `&mut Router`, so every handler is in place before the
//! router is shared for dispatch.

use std::sync::Arc;

use tracing::debug;

use courier_core::BoxedSession;

use crate::argument::{ArgumentRegistry, ManualParseable, Parseable};
use crate::context::{Context, ErrorFormatter, ErrorLogger};
use crate::error::{ConfigurationError, DispatchError};
use crate::flags::names_overlap;
use crate::registrar::{Command, CommandSet};
use crate::subcommand::Subcommand;

/// Owns every command table and the shared context.
#[derive(Debug)]
pub struct Router {
    context: Arc<Context>,
    root: Subcommand,
    subcommands: Vec<Subcommand>,
    registry: ArgumentRegistry,
}

impl Router {
    /// Creates a router with default settings and `root` as its root handler.
    pub fn new<H: CommandSet>(session: BoxedSession, root: H) -> Result<Self, ConfigurationError> {
        Self::builder(session).build(root)
    }

    /// Returns a builder for a router using `session`.
    pub fn builder(session: BoxedSession) -> RouterBuilder {
        RouterBuilder {
            session,
            prefix: None,
            name: None,
            description: None,
            format_error: None,
            log_error: None,
            registry: ArgumentRegistry::new(),
        }
    }

    /// Registers `handler` as a named subcommand.
    ///
    /// Fails if a token could select both this and an earlier subcommand.
    pub fn register_subcommand<H: CommandSet>(
        &mut self,
        handler: H,
    ) -> Result<&Subcommand, ConfigurationError> {
        let sub = Subcommand::named(handler, &self.context, &self.registry)?;

        if self
            .subcommands
            .iter()
            .any(|s| names_overlap((s.flags(), s.name()), (sub.flags(), sub.name())))
        {
            return Err(ConfigurationError::DuplicateSubcommand {
                name: sub.name().to_owned(),
            });
        }

        self.subcommands.push(sub);
        Ok(&self.subcommands[self.subcommands.len() - 1])
    }

    /// Registers a single-token argument type for later registrations.
    pub fn register_argument<T: Parseable + Clone>(&mut self, template: T) -> &mut Self {
        self.registry.register(template);
        self
    }

    /// Registers a whole-line argument type for later registrations.
    pub fn register_manual_argument<T: ManualParseable + Default>(&mut self) -> &mut Self {
        self.registry.register_manual::<T>();
        self
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Returns the root group.
    pub fn root(&self) -> &Subcommand {
        &self.root
    }

    /// Returns the root commands.
    pub fn commands(&self) -> &[Command] {
        self.root.commands()
    }

    /// Returns the subcommands in registration order.
    pub fn subcommands(&self) -> &[Subcommand] {
        &self.subcommands
    }

    /// Returns the subcommand with exactly this name.
    pub fn subcommand(&self, name: &str) -> Option<&Subcommand> {
        self.subcommands.iter().find(|s| s.name() == name)
    }

    pub fn arguments(&self) -> &ArgumentRegistry {
        &self.registry
    }

    /// Formats `err` with the context's formatting hook.
    pub fn format_error(&self, err: &DispatchError) -> String {
        self.context.format_error(err)
    }
}

/// Builder for [`Router`].
#[must_use = "a router is only created once `build` is called"]
pub struct RouterBuilder {
    session: BoxedSession,
    prefix: Option<String>,
    name: Option<String>,
    description: Option<String>,
    format_error: Option<ErrorFormatter>,
    log_error: Option<ErrorLogger>,
    registry: ArgumentRegistry,
}

impl RouterBuilder {
    /// Sets the command prefix. Defaults to `~`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the hook that turns dispatch failures into reply text.
    pub fn format_error<F>(mut self, format: F) -> Self
    where
        F: Fn(&DispatchError) -> String + Send + Sync + 'static,
    {
        self.format_error = Some(Arc::new(format));
        self
    }

    /// Sets the hook that receives failures nobody can be replied to.
    pub fn log_error<F>(mut self, log: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) + Send + Sync + 'static,
    {
        self.log_error = Some(Arc::new(log));
        self
    }

    /// Registers a single-token argument type.
    pub fn argument<T: Parseable + Clone>(mut self, template: T) -> Self {
        self.registry.register(template);
        self
    }

    /// Registers a whole-line argument type.
    pub fn manual_argument<T: ManualParseable + Default>(mut self) -> Self {
        self.registry.register_manual::<T>();
        self
    }

    /// Replaces the argument registry.
    pub fn arguments(mut self, registry: ArgumentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Builds the router with `root` as its root handler.
    pub fn build<H: CommandSet>(self, root: H) -> Result<Router, ConfigurationError> {
        let context = Arc::new(Context::new(self.session));
        if let Some(prefix) = self.prefix {
            context.set_prefix(prefix);
        }
        if let Some(name) = self.name {
            context.set_name(name);
        }
        if let Some(description) = self.description {
            context.set_description(description);
        }
        if let Some(format) = self.format_error {
            context.replace_format_error(format);
        }
        if let Some(log) = self.log_error {
            context.replace_log_error(log);
        }

        let root = Subcommand::root(root, &context, &self.registry)?;
        debug!(
            prefix = %context.prefix(),
            commands = root.commands().len(),
            "router built"
        );

        Ok(Router {
            context,
            root,
            subcommands: Vec::new(),
            registry: self.registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSlot;
    use crate::context::tests::MockSession;
    use crate::registrar::{Inject, Registrar};
    use courier_core::{BoxError, MessageCreate};
    use futures::FutureExt;

    #[derive(Default)]
    struct TestCommands {
        ctx: ContextSlot,
    }

    impl Inject for TestCommands {
        const TYPE_NAME: &'static str = "TestCommands";

        fn inject_context(&mut self, ctx: &Arc<Context>) -> bool {
            self.ctx.set(ctx);
            true
        }
    }

    impl CommandSet for TestCommands {
        fn register(r: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
            r.command::<MessageCreate>("noop")
                .invoke(|_, _, _| async { Ok(()) }.boxed())
        }
    }

    #[derive(Default)]
    struct Other {
        ctx: ContextSlot,
    }

    impl Inject for Other {
        const TYPE_NAME: &'static str = "testcommands";

        fn inject_context(&mut self, ctx: &Arc<Context>) -> bool {
            self.ctx.set(ctx);
            true
        }
    }

    impl CommandSet for Other {
        fn register(_: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
            Ok(())
        }
    }

    macro_rules! named_set {
        ($name:ident, $type_name:literal) => {
            #[derive(Default)]
            struct $name {
                ctx: ContextSlot,
            }

            impl Inject for $name {
                const TYPE_NAME: &'static str = $type_name;

                fn inject_context(&mut self, ctx: &Arc<Context>) -> bool {
                    self.ctx.set(ctx);
                    true
                }
            }

            impl CommandSet for $name {
                fn register(_: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
                    Ok(())
                }
            }
        };
    }

    named_set!(RawOps, "RーOps");
    named_set!(RawUpperOps, "RーOPS");
    named_set!(Ops, "ops");

    #[derive(Clone, Default)]
    struct Upper(String);

    impl Parseable for Upper {
        fn parse(&mut self, token: &str) -> Result<(), BoxError> {
            self.0 = token.to_uppercase();
            Ok(())
        }
    }

    fn session() -> BoxedSession {
        Arc::new(MockSession::default())
    }

    #[test]
    fn test_builder_settings() {
        let router = Router::builder(session())
            .prefix("!")
            .name("courier")
            .description("a bot")
            .argument(Upper::default())
            .build(TestCommands::default())
            .unwrap();

        assert_eq!(router.context().prefix(), "!");
        assert_eq!(router.context().name(), "courier");
        assert_eq!(router.context().description(), "a bot");
        assert!(router.arguments().contains::<Upper>());
        assert_eq!(router.commands().len(), 1);
        assert_eq!(router.root().name(), "");
    }

    #[test]
    fn test_root_handler_shares_context() {
        let router = Router::new(session(), TestCommands::default()).unwrap();
        let handler = router.root().handler::<TestCommands>().unwrap();
        assert!(Arc::ptr_eq(handler.ctx.get().unwrap(), router.context()));
    }

    #[test]
    fn test_duplicate_subcommand() {
        let mut router = Router::new(session(), TestCommands::default()).unwrap();
        router.register_subcommand(TestCommands::default()).unwrap();

        let err = router.register_subcommand(Other::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateSubcommand {
                name: "testcommands".into()
            }
        );
        assert_eq!(router.subcommands().len(), 1);
        assert!(router.subcommand("testcommands").is_some());
    }

    #[test]
    fn test_duplicate_subcommand_across_casing() {
        let mut router = Router::new(session(), TestCommands::default()).unwrap();
        router.register_subcommand(RawOps::default()).unwrap();
        router.register_subcommand(RawUpperOps::default()).unwrap();

        let err = router.register_subcommand(Ops::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateSubcommand { name: "ops".into() }
        );
        assert_eq!(router.subcommands().len(), 2);
        assert_eq!(router.subcommand("Ops").map(Subcommand::name), Some("Ops"));
    }

    #[test]
    fn test_register_argument_affects_later_registrations() {
        let mut router = Router::new(session(), TestCommands::default()).unwrap();
        assert!(!router.arguments().contains::<Upper>());

        router.register_argument(Upper::default());
        assert!(router.arguments().contains::<Upper>());
    }
}
