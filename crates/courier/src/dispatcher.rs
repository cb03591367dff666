//! Routing one event to its command.
//!
//! # Message events
//!
//! A [`MessageCreate`] whose content starts with the prefix is stripped of
//! the prefix and tokenized. The first token names a root command, or a
//! subcommand followed by one of its commands:
//!
//! 1. Root command matching `token[0]`: arguments start at index 1
//! 2. Subcommand matching `token[0]` and command matching `token[1]`:
//!    arguments start at index 2
//! 3. Anything else is [`DispatchError::UnknownCommand`]
//!
//! Commands and subcommands marked admin-only are invisible to everyone
//! else: a caller who is not an administrator gets the same error as for a
//! name that does not exist.
//!
//! # Other events
//!
//! Every command declared for the exact event type runs, root commands
//! first, then each subcommand in registration order. Failures go to the
//! context's logging hook and never to the caller.

use tracing::{Instrument, debug, debug_span, trace};

use courier_core::{BoxedEvent, BoxedSession, MessageCreate};

use crate::argument::Arguments;
use crate::error::DispatchError;
use crate::flags::Flags;
use crate::registrar::{ArgumentPlan, Command};
use crate::router::Router;
use crate::tokenizer::tokenize;

/// State of a single dispatch.
///
/// The caller's administrator status is looked up at most once, and only if
/// an admin-only target is reached.
pub(crate) struct DispatchState<'a> {
    event: &'a BoxedEvent,
    session: &'a BoxedSession,
    is_admin: Option<bool>,
}

impl<'a> DispatchState<'a> {
    pub(crate) fn new(event: &'a BoxedEvent, session: &'a BoxedSession) -> Self {
        Self {
            event,
            session,
            is_admin: None,
        }
    }

    async fn is_admin(&mut self) -> bool {
        if let Some(is_admin) = self.is_admin {
            return is_admin;
        }

        let is_admin = match (self.event.channel_id(), self.event.user_id()) {
            (Some(channel_id), Some(user_id)) => {
                match self.session.user_permissions(channel_id, user_id).await {
                    Ok(permissions) => permissions.is_admin(),
                    Err(err) => {
                        debug!(error = %err, "permission lookup failed, treating caller as non-admin");
                        false
                    }
                }
            }
            _ => false,
        };

        trace!(is_admin, "resolved caller permissions");
        self.is_admin = Some(is_admin);
        is_admin
    }

    /// Returns `true` if the caller may see a target with `flags`.
    async fn passes(&mut self, flags: Flags) -> bool {
        !flags.is_admin_only() || self.is_admin().await
    }
}

impl Router {
    /// Routes one event.
    ///
    /// Only message events can fail; see the [module docs](self) for the
    /// routing rules.
    pub async fn dispatch(&self, event: BoxedEvent) -> Result<(), DispatchError> {
        let span = debug_span!("dispatch", event = event.event_name());

        async move {
            let session = self.context().session();
            let mut state = DispatchState::new(&event, session);

            if event.kind().is_message() {
                self.dispatch_message(&event, &mut state).await
            } else {
                self.dispatch_event(&event, &mut state).await;
                Ok(())
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch_event(&self, event: &BoxedEvent, state: &mut DispatchState<'_>) {
        let kind = event.kind();
        let mut targets: Vec<&Command> = Vec::new();

        for command in self.commands() {
            if command.event_kind() == kind && state.passes(command.flags()).await {
                targets.push(command);
            }
        }

        for sub in self.subcommands() {
            // Collected up front: a lazy `Filter` held across `.await` trips
            // rustc's higher-ranked `Send` check when spawned (rust-lang/rust#110338).
            let candidates: Vec<&Command> = sub
                .commands()
                .iter()
                .filter(|command| command.event_kind() == kind)
                .collect();
            if candidates.is_empty() || !state.passes(sub.flags()).await {
                continue;
            }
            for command in candidates {
                if state.passes(command.flags()).await {
                    targets.push(command);
                }
            }
        }

        trace!(handlers = targets.len(), "fanning out event");
        for command in targets {
            if let Err(err) = command.call(event.clone(), Arguments::new()).await {
                debug!(command = command.name(), "event handler failed");
                self.context().log_error(&*err);
            }
        }
    }

    async fn dispatch_message(
        &self,
        event: &BoxedEvent,
        state: &mut DispatchState<'_>,
    ) -> Result<(), DispatchError> {
        let Some(message) = event.downcast_ref::<MessageCreate>() else {
            return Ok(());
        };

        let prefix = self.context().prefix();
        let Some(content) = message.content.strip_prefix(prefix.as_str()) else {
            return Ok(());
        };

        let args = tokenize(content).map_err(|err| DispatchError::InvalidUsage {
            index: err.index(),
            message: err.to_string(),
            args: Vec::new(),
            prefix: prefix.clone(),
        })?;
        if args.is_empty() {
            return Ok(());
        }

        let (command, offset) = self.resolve(&args, &prefix, state).await?;
        debug!(command = command.name(), offset, "command resolved");

        let arguments = bind(command, &args, offset, &prefix)?;
        command
            .call(event.clone(), arguments)
            .await
            .map_err(DispatchError::Handler)
    }

    /// Finds the command selected by `args`, applying admin gates.
    async fn resolve(
        &self,
        args: &[String],
        prefix: &str,
        state: &mut DispatchState<'_>,
    ) -> Result<(&Command, usize), DispatchError> {
        let unknown = |command: &str, parent: Option<&str>| DispatchError::UnknownCommand {
            command: command.to_owned(),
            parent: parent.map(str::to_owned),
            prefix: prefix.to_owned(),
        };

        if let Some(command) = self.root().find(&args[0]) {
            if state.passes(command.flags()).await {
                return Ok((command, 1));
            }
            trace!(command = command.name(), "root command hidden from caller");
        }

        if args.len() > 1 {
            if let Some(sub) = self.subcommands().iter().find(|s| s.matches(&args[0])) {
                if state.passes(sub.flags()).await {
                    if let Some(command) = sub.find(&args[1]) {
                        if state.passes(command.flags()).await {
                            return Ok((command, 2));
                        }
                    }
                    return Err(unknown(&args[1], Some(sub.name())));
                }
                trace!(subcommand = sub.name(), "subcommand hidden from caller");
            }
        }

        Err(unknown(&args[0], None))
    }
}

/// Coerces the tokens after `offset` into the arguments of `command`.
fn bind(
    command: &Command,
    args: &[String],
    offset: usize,
    prefix: &str,
) -> Result<Arguments, DispatchError> {
    let mut arguments = Arguments::new();

    match command.plan() {
        ArgumentPlan::Manual(manual) => {
            let value = manual
                .coerce(&args[offset - 1..])
                .map_err(DispatchError::Handler)?;
            arguments.push(value);
        }
        ArgumentPlan::Tokens(coercers) if coercers.is_empty() => {}
        ArgumentPlan::Tokens(coercers) => {
            let given = &args[offset..];
            if given.len() != coercers.len() {
                let message = if given.len() < coercers.len() {
                    "not enough arguments given"
                } else {
                    "too many arguments given"
                };
                return Err(DispatchError::InvalidUsage {
                    index: offset + given.len().min(coercers.len()),
                    message: message.to_owned(),
                    args: args.to_vec(),
                    prefix: prefix.to_owned(),
                });
            }

            for (i, (token, coercer)) in given.iter().zip(coercers).enumerate() {
                let value = coercer
                    .coerce(token)
                    .map_err(|err| DispatchError::InvalidUsage {
                        index: offset + i,
                        message: err.to_string(),
                        args: args.to_vec(),
                        prefix: prefix.to_owned(),
                    })?;
                arguments.push(value);
            }
        }
    }

    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::{ManualParseable, RawArguments};
    use crate::context::tests::MockSession;
    use crate::context::{Context, ContextSlot};
    use crate::error::ConfigurationError;
    use crate::registrar::{CommandSet, Inject, Registrar};

    use courier_core::{BoxError, Event, MessageDelete, MessageUpdate, User};
    use futures::FutureExt;
    use parking_lot::Mutex;
    use std::any::Any;
    use std::sync::Arc;

    type Calls = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct Root {
        ctx: ContextSlot,
        calls: Calls,
    }

    impl Inject for Root {
        const TYPE_NAME: &'static str = "Root";

        fn inject_context(&mut self, ctx: &Arc<Context>) -> bool {
            self.ctx.set(ctx);
            true
        }
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl ManualParseable for Lines {
        fn parse_content(&mut self, args: &[String]) -> Result<(), BoxError> {
            if args.len() > 3 {
                return Err("too many lines".into());
            }
            self.0 = args.to_vec();
            Ok(())
        }
    }

    impl CommandSet for Root {
        fn register(r: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
            r.command::<MessageCreate>("echo")
                .arg::<String>()
                .invoke(|this, _, mut args| {
                    async move {
                        let word = args.take::<String>().map_err(BoxError::from)?;
                        this.calls.lock().push(format!("echo {word}"));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("add")
                .arg::<i64>()
                .arg::<i64>()
                .invoke(|this, _, mut args| {
                    async move {
                        let a = args.take::<i64>().map_err(BoxError::from)?;
                        let b = args.take::<i64>().map_err(BoxError::from)?;
                        this.calls.lock().push(format!("add {}", a + b));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("noargs")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push("noargs".to_owned());
                        Err::<(), BoxError>("passed".into())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("lines")
                .arg::<Lines>()
                .invoke(|this, _, mut args| {
                    async move {
                        let lines = args.take::<Lines>().map_err(BoxError::from)?;
                        this.calls.lock().push(lines.0.join("|"));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("Aーshutdown")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push("shutdown".to_owned());
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("RーGOOS")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push("GOOS".to_owned());
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageUpdate>("edited")
                .invoke(|this, event, _| {
                    async move {
                        let update = event.downcast_ref::<MessageUpdate>().ok_or("not an update")?;
                        this.calls.lock().push(format!("root edited {}", update.content));
                        Err::<(), BoxError>("root edit failed".into())
                    }
                    .boxed()
                })?;
            r.command::<MessageUpdate>("Aーaudit")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push("root audit".to_owned());
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })
        }
    }

    #[derive(Default)]
    struct TestCommands {
        ctx: ContextSlot,
        calls: Calls,
        name: Option<&'static str>,
    }

    impl Inject for TestCommands {
        const TYPE_NAME: &'static str = "TestCommands";

        fn inject_context(&mut self, ctx: &Arc<Context>) -> bool {
            self.ctx.set(ctx);
            true
        }
    }

    impl CommandSet for TestCommands {
        fn self_name(&self) -> Option<String> {
            self.name.map(str::to_owned)
        }

        fn register(r: &mut Registrar<'_, Self>) -> Result<(), ConfigurationError> {
            r.command::<MessageCreate>("noop")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push(format!("{} noop", this.name.unwrap_or("sub")));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("flag")
                .arg::<RawArguments>()
                .invoke(|this, _, mut args| {
                    async move {
                        let raw = args.take::<RawArguments>().map_err(BoxError::from)?;
                        this.calls.lock().push(format!("flag {}", raw.join(",")));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageCreate>("Aーban")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push("ban".to_owned());
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })?;
            r.command::<MessageUpdate>("edited")
                .invoke(|this, _, _| {
                    async move {
                        this.calls.lock().push(format!("{} edited", this.name.unwrap_or("sub")));
                        Ok::<(), BoxError>(())
                    }
                    .boxed()
                })
        }
    }

    struct Fixture {
        router: Router,
        session: Arc<MockSession>,
        calls: Calls,
        logged: Calls,
    }

    fn fixture(session: MockSession) -> Fixture {
        let session = Arc::new(session);
        let calls = Calls::default();
        let logged = Calls::default();
        let sink = Arc::clone(&logged);

        let mut router = Router::builder(session.clone())
            .log_error(move |err| sink.lock().push(err.to_string()))
            .manual_argument::<Lines>()
            .build(Root {
                calls: Arc::clone(&calls),
                ..Default::default()
            })
            .unwrap();
        router
            .register_subcommand(TestCommands {
                calls: Arc::clone(&calls),
                ..Default::default()
            })
            .unwrap();
        router
            .register_subcommand(TestCommands {
                calls: Arc::clone(&calls),
                name: Some("Aーops"),
                ..Default::default()
            })
            .unwrap();

        Fixture {
            router,
            session,
            calls,
            logged,
        }
    }

    fn author(id: &str) -> User {
        User {
            id: id.to_owned(),
            username: "tester".to_owned(),
            bot: false,
        }
    }

    fn message(content: &str) -> BoxedEvent {
        BoxedEvent::new(MessageCreate::new("general", author("7"), content))
    }

    fn update(content: &str) -> BoxedEvent {
        let mut event = MessageUpdate::default();
        event.message.channel_id = "general".to_owned();
        event.message.author = Some(author("7"));
        event.message.content = content.to_owned();
        BoxedEvent::new(event)
    }

    impl Fixture {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[tokio::test]
    async fn test_root_command_with_argument() {
        let f = fixture(MockSession::default());
        f.router.dispatch(message("~echo hello")).await.unwrap();
        f.router.dispatch(message("~ECHO \"two words\"")).await.unwrap();
        assert_eq!(f.calls(), ["echo hello", "echo two words"]);
    }

    #[tokio::test]
    async fn test_ignores_messages_without_prefix() {
        let f = fixture(MockSession::default());
        f.router.dispatch(message("echo hello")).await.unwrap();
        f.router.dispatch(message("~")).await.unwrap();
        assert!(f.calls().is_empty());
    }

    #[tokio::test]
    async fn test_integer_coercion() {
        let f = fixture(MockSession::default());
        f.router.dispatch(message("~add 40 2")).await.unwrap();
        assert_eq!(f.calls(), ["add 42"]);

        let err = f.router.dispatch(message("~add 40 abc")).await.unwrap_err();
        let DispatchError::InvalidUsage { index, args, .. } = err else {
            panic!("expected invalid usage, got {err:?}");
        };
        assert_eq!(index, 2);
        assert_eq!(args, ["add", "40", "abc"]);
    }

    #[tokio::test]
    async fn test_arity_mismatch() {
        let f = fixture(MockSession::default());

        let err = f.router.dispatch(message("~add 1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUsage { index: 2, .. }));
        assert!(err.to_string().contains("not enough arguments"));

        let err = f.router.dispatch(message("~add 1 2 3")).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUsage { index: 3, .. }));
        assert!(f.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_argument_command_ignores_trailing_tokens() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~noargs a b c")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(err.to_string(), "passed");
        assert_eq!(f.calls(), ["noargs"]);
    }

    #[tokio::test]
    async fn test_manual_receives_full_token_list() {
        let f = fixture(MockSession::default());
        f.router.dispatch(message("~lines arg1 :)")).await.unwrap();
        assert_eq!(f.calls(), ["lines|arg1|:)"]);

        let err = f.router.dispatch(message("~lines a b c")).await.unwrap_err();
        assert_eq!(err.to_string(), "too many lines");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~nope")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand { ref command, parent: None, .. } if command == "nope"
        ));
    }

    #[tokio::test]
    async fn test_multi_word_prefix() {
        let f = fixture(MockSession::default());
        f.router.context().set_prefix("joe pls ");
        let err = f.router.dispatch(message("joe pls no")).await.unwrap_err();
        assert!(err.to_string().starts_with("unknown command:"));
    }

    #[tokio::test]
    async fn test_subcommand_routing() {
        let f = fixture(MockSession::default());
        f.router.context().set_prefix("run ");
        f.router.dispatch(message("run testcommands noop")).await.unwrap();
        f.router.dispatch(message("run testcommands flag -v x")).await.unwrap();
        assert_eq!(f.calls(), ["sub noop", "flag -v,x"]);

        let err = f
            .router
            .dispatch(message("run testcommands missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand { ref command, parent: Some(ref parent), .. }
                if command == "missing" && parent == "testcommands"
        ));
    }

    #[tokio::test]
    async fn test_subcommand_name_alone_is_unknown() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~testcommands")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand { ref command, parent: None, .. } if command == "testcommands"
        ));
    }

    #[tokio::test]
    async fn test_raw_command_matches_exactly() {
        let f = fixture(MockSession::default());
        f.router.dispatch(message("~GOOS")).await.unwrap();
        assert!(f.router.dispatch(message("~goos")).await.is_err());
        assert_eq!(f.calls(), ["GOOS"]);
    }

    #[tokio::test]
    async fn test_admin_command_hidden_from_non_admin() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~shutdown")).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCommand { parent: None, .. }));

        let err = f.router.dispatch(message("~testcommands ban")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand { ref command, parent: Some(_), .. } if command == "ban"
        ));
        assert!(f.calls().is_empty());
    }

    #[tokio::test]
    async fn test_admin_subcommand_hidden_from_non_admin() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~ops noop")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand { ref command, parent: None, .. } if command == "ops"
        ));
    }

    #[tokio::test]
    async fn test_admin_passes_gates() {
        let f = fixture(MockSession::with_admin("7"));
        f.router.dispatch(message("~shutdown")).await.unwrap();
        f.router.dispatch(message("~ops ban")).await.unwrap();
        assert_eq!(f.calls(), ["shutdown", "ban"]);
    }

    #[tokio::test]
    async fn test_admin_lookup_at_most_once_per_dispatch() {
        let f = fixture(MockSession::with_admin("7"));
        f.router.dispatch(message("~ops ban")).await.unwrap();
        assert_eq!(f.session.lookups(), 1);

        f.router.dispatch(message("~echo hi")).await.unwrap();
        assert_eq!(f.session.lookups(), 1);
    }

    #[tokio::test]
    async fn test_tokenizer_error_is_invalid_usage() {
        let f = fixture(MockSession::default());
        let err = f.router.dispatch(message("~echo \"open")).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUsage { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_event_fan_out() {
        let f = fixture(MockSession::default());
        f.router.dispatch(update("fixed typo")).await.unwrap();

        assert_eq!(f.calls(), ["root edited fixed typo", "sub edited"]);
        assert_eq!(*f.logged.lock(), ["root edit failed"]);
    }

    #[tokio::test]
    async fn test_event_fan_out_as_admin() {
        let f = fixture(MockSession::with_admin("7"));
        f.router.dispatch(update("x")).await.unwrap();

        assert_eq!(
            f.calls(),
            ["root edited x", "root audit", "sub edited", "Aーops edited"]
        );
        assert_eq!(f.session.lookups(), 1);
    }

    #[tokio::test]
    async fn test_event_without_handlers() {
        let f = fixture(MockSession::default());
        let event = BoxedEvent::new(MessageDelete {
            id: "1".into(),
            channel_id: "general".into(),
            guild_id: None,
        });
        f.router.dispatch(event).await.unwrap();
        assert!(f.calls().is_empty());
        assert_eq!(f.session.lookups(), 0);
    }

    struct Reaction;

    impl Event for Reaction {
        fn event_name(&self) -> &'static str {
            "reaction"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn channel_id(&self) -> Option<&str> {
            Some("general")
        }

        fn user_id(&self) -> Option<&str> {
            Some("7")
        }
    }

    #[tokio::test]
    async fn test_unhandled_event_skips_permission_lookup() {
        let f = fixture(MockSession::default());
        f.router.dispatch(BoxedEvent::new(Reaction)).await.unwrap();
        assert!(f.calls().is_empty());
        assert_eq!(f.session.lookups(), 0);
    }
}
