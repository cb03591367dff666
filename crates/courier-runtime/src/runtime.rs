//! The event loop.
//!
//! A [`Runtime`] owns a [`Router`] and reads events from a stream, usually
//! the receiving half of [`channel`]. Each event is dispatched on its own
//! task; a message command that fails is answered in its channel with the
//! formatted error.
//!
//! ```rust,ignore
//! let router = Router::new(session, Commands::default())?;
//! let runtime = Runtime::builder().config_file("courier.toml").build(router)?;
//!
//! let (tx, events) = courier_runtime::channel(64);
//! spawn_gateway(tx);
//! runtime.run(events).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use courier::Router;
use courier_core::{BoxedEvent, MessageCreate};

use crate::config::{ConfigLoader, CourierConfig};
use crate::error::{ReplyFailed, RuntimeError, RuntimeResult};
use crate::logging;

/// Sending half of an event channel.
pub type EventSender = mpsc::Sender<BoxedEvent>;

/// Receiving half of an event channel.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<BoxedEvent>,
}

impl Stream for EventStream {
    type Item = BoxedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Creates a bounded channel feeding a [`Runtime`].
pub fn channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, EventStream { rx })
}

/// Dispatches events from a stream until told to stop.
pub struct Runtime {
    router: Arc<Router>,
    reply_errors: bool,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Runtime {
    /// Creates a runtime that replies to failed commands.
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            reply_errors: true,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Creates a runtime, applying the command settings of `config` to the
    /// router's context and installing the logging subscriber.
    pub fn from_config(router: Router, config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        let ctx = router.context();
        if let Some(prefix) = &config.bot.prefix {
            ctx.set_prefix(prefix.as_str());
        }
        if let Some(name) = &config.bot.name {
            ctx.set_name(name.as_str());
        }
        if let Some(description) = &config.bot.description {
            ctx.set_description(description.as_str());
        }

        info!(
            prefix = %ctx.prefix(),
            reply_errors = config.bot.reply_errors,
            log_level = %config.logging.level,
            "runtime initialized from configuration"
        );

        Self {
            reply_errors: config.bot.reply_errors,
            ..Self::new(router)
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns a token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the event loop. In-flight dispatches still complete.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Dispatches one event on a new task.
    pub fn spawn(&self, event: BoxedEvent) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        let reply_errors = self.reply_errors;
        self.tasks
            .spawn(async move { handle_event(&router, event, reply_errors).await })
    }

    /// Runs until Ctrl+C, SIGTERM, [`shutdown`](Self::shutdown) or the end of
    /// `events`.
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = BoxedEvent> + Unpin,
    {
        let signal = shutdown_signal()?;
        self.run_until(events, signal).await
    }

    /// Runs until `shutdown` resolves, [`shutdown`](Self::shutdown) is called
    /// or `events` ends, then waits for in-flight dispatches.
    pub async fn run_until<S, F>(&self, mut events: S, shutdown: F) -> RuntimeResult<()>
    where
        S: Stream<Item = BoxedEvent> + Unpin,
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        self.tasks.reopen();
        info!("runtime started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = &mut shutdown => break,
                event = events.next() => match event {
                    Some(event) => {
                        self.spawn(event);
                    }
                    None => {
                        debug!("event stream ended");
                        break;
                    }
                },
            }
        }

        self.tasks.close();
        debug!(in_flight = self.tasks.len(), "waiting for dispatches");
        self.tasks.wait().await;
        info!("runtime stopped");
        Ok(())
    }
}

/// Dispatches `event` and answers a failed message command.
async fn handle_event(router: &Router, event: BoxedEvent, reply_errors: bool) {
    let channel_id = event
        .downcast_ref::<MessageCreate>()
        .map(|m| m.channel_id.clone());

    let Err(err) = router.dispatch(event).await else {
        return;
    };

    let ctx = router.context();
    let Some(channel_id) = channel_id.filter(|_| reply_errors) else {
        ctx.log_error(&err);
        return;
    };

    let reply = ctx.format_error(&err);
    if reply.is_empty() {
        debug!(error = %err, "error reply suppressed");
        return;
    }

    if let Err(send_err) = ctx.send(&channel_id, &reply).await {
        ctx.log_error(&ReplyFailed { reply, source: err });
        ctx.log_error(&send_err);
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
fn shutdown_signal() -> RuntimeResult<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(RuntimeError::Signal)?;

    Ok(async move {
        #[cfg(unix)]
        tokio::select! {
            result = signal::ctrl_c() => ctrl_c_received(result).await,
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }

        #[cfg(not(unix))]
        ctrl_c_received(signal::ctrl_c().await).await;
    })
}

async fn ctrl_c_received(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(err) => {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Builder loading configuration for a [`Runtime`].
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<CourierConfig>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self, router: Router) -> RuntimeResult<Runtime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load().map_err(RuntimeError::Config)?,
        };
        Ok(Runtime::from_config(router, &config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier::{BoxError, ContextSlot, DispatchError, Inject, MessageUpdate, User, commands};
    use courier_core::{Permissions, SentMessage, Session, TransportError, TransportResult};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockSession {
        sent: Mutex<Vec<(String, String)>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl Session for MockSession {
        async fn send_message(&self, channel_id: &str, content: &str) -> TransportResult<SentMessage> {
            if self.fail_sends {
                return Err(TransportError::send_failed(channel_id, "offline"));
            }
            self.sent
                .lock()
                .push((channel_id.to_owned(), content.to_owned()));
            Ok(SentMessage {
                id: "1".to_owned(),
                channel_id: channel_id.to_owned(),
            })
        }

        async fn user_permissions(&self, _: &str, _: &str) -> TransportResult<Permissions> {
            Ok(Permissions::NONE)
        }
    }

    #[derive(Default, Inject)]
    struct Commands {
        ctx: ContextSlot,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[commands]
    impl Commands {
        pub async fn send(&self, _: &MessageCreate, _word: String) -> Result<(), BoxError> {
            Err("oh no".into())
        }

        pub fn seen(&self, m: &MessageCreate) -> Result<(), BoxError> {
            self.seen.lock().push(m.content.clone());
            Ok(())
        }

        pub async fn slow(&self, _: &MessageCreate) -> Result<(), BoxError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.seen.lock().push("slow".to_owned());
            Ok(())
        }

        pub fn edited(&self, _: &MessageUpdate) -> Result<(), BoxError> {
            Err("edit failed".into())
        }
    }

    struct Fixture {
        runtime: Runtime,
        session: Arc<MockSession>,
        seen: Arc<Mutex<Vec<String>>>,
        logged: Arc<Mutex<Vec<String>>>,
    }

    fn fixture(session: MockSession, config: &CourierConfig) -> Fixture {
        let session = Arc::new(session);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let logged = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&logged);

        let router = Router::builder(session.clone())
            .log_error(move |err| sink.lock().push(err.to_string()))
            .build(Commands {
                seen: Arc::clone(&seen),
                ..Default::default()
            })
            .unwrap();

        Fixture {
            runtime: Runtime::from_config(router, config),
            session,
            seen,
            logged,
        }
    }

    fn message(content: &str) -> BoxedEvent {
        let author = User {
            id: "7".to_owned(),
            username: "tester".to_owned(),
            bot: false,
        };
        BoxedEvent::new(MessageCreate::new("general", author, content))
    }

    #[tokio::test]
    async fn test_failed_command_is_replied() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        f.runtime.spawn(message("~send test")).await.unwrap();

        assert_eq!(
            *f.session.sent.lock(),
            [("general".to_owned(), "oh no".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_replied() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        f.runtime.spawn(message("~nope")).await.unwrap();

        let sent = f.session.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("unknown command"));
    }

    #[tokio::test]
    async fn test_empty_format_suppresses_reply() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        f.runtime
            .router()
            .context()
            .set_format_error(|_: &DispatchError| String::new());
        f.runtime.spawn(message("~send test")).await.unwrap();

        assert!(f.session.sent.lock().is_empty());
        assert!(f.logged.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_logged_twice() {
        let session = MockSession {
            fail_sends: true,
            ..Default::default()
        };
        let f = fixture(session, &CourierConfig::default());
        f.runtime.spawn(message("~send test")).await.unwrap();

        let logged = f.logged.lock();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0], "oh no: oh no");
        assert!(logged[1].contains("offline"));
    }

    #[tokio::test]
    async fn test_reply_disabled_logs_instead() {
        let mut config = CourierConfig::default();
        config.bot.reply_errors = false;
        let f = fixture(MockSession::default(), &config);
        f.runtime.spawn(message("~send test")).await.unwrap();

        assert!(f.session.sent.lock().is_empty());
        assert_eq!(*f.logged.lock(), ["oh no"]);
    }

    #[tokio::test]
    async fn test_non_message_failures_are_logged() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        f.runtime
            .spawn(BoxedEvent::new(MessageUpdate::default()))
            .await
            .unwrap();

        assert!(f.session.sent.lock().is_empty());
        assert_eq!(*f.logged.lock(), ["edit failed"]);
    }

    #[tokio::test]
    async fn test_config_applies_to_context() {
        let mut config = CourierConfig::default();
        config.bot.prefix = Some("!".to_owned());
        config.bot.name = Some("courier".to_owned());
        let f = fixture(MockSession::default(), &config);

        assert_eq!(f.runtime.router().context().prefix(), "!");
        assert_eq!(f.runtime.router().context().name(), "courier");

        f.runtime.spawn(message("!seen")).await.unwrap();
        f.runtime.spawn(message("~seen")).await.unwrap();
        assert_eq!(*f.seen.lock(), ["!seen"]);
    }

    #[test]
    fn test_unset_prefix_keeps_router_prefix() {
        figment::Jail::expect_with(|jail| {
            let router = Router::builder(Arc::new(MockSession::default()))
                .prefix("!")
                .build(Commands::default())
                .map_err(|e| e.to_string())?;
            let runtime = Runtime::builder()
                .search_path(jail.directory())
                .without_env()
                .build(router)
                .map_err(|e| e.to_string())?;

            assert_eq!(runtime.router().context().prefix(), "!");
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_run_drains_in_flight_dispatches() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        let (tx, events) = channel(8);

        tx.send(message("~slow")).await.unwrap();
        tx.send(message("~seen")).await.unwrap();
        drop(tx);

        f.runtime
            .run_until(events, std::future::pending())
            .await
            .unwrap();

        let mut seen = f.seen.lock().clone();
        seen.sort();
        assert_eq!(seen, ["slow", "~seen"]);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_loop() {
        let f = fixture(MockSession::default(), &CourierConfig::default());
        let (_tx, events) = channel(8);

        f.runtime.shutdown();
        tokio::time::timeout(
            Duration::from_secs(1),
            f.runtime.run_until(events, std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
