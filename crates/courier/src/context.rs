//! The shared context handed to every handler object.
//!
//! One [`Context`] exists per [`Router`](crate::Router). Every handler
//! receives the same `Arc<Context>` in its [`ContextSlot`] field, so a change
//! made through one handler, such as a new prefix, is seen by all of them on
//! the next dispatch.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::error;

use courier_core::{BoxedSession, MessageCreate, SentMessage, TransportResult};

use crate::error::DispatchError;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "~";

/// Turns a dispatch failure into the text replied to the user.
///
/// Returning an empty string suppresses the reply.
pub type ErrorFormatter = Arc<dyn Fn(&DispatchError) -> String + Send + Sync>;

/// Receives every failure that cannot be replied to.
pub type ErrorLogger = Arc<dyn Fn(&(dyn StdError + 'static)) + Send + Sync>;

fn default_formatter() -> ErrorFormatter {
    Arc::new(|err| err.to_string())
}

fn default_logger() -> ErrorLogger {
    Arc::new(|err| error!(error = %err, "command failed"))
}

/// State shared by the router and every handler object.
pub struct Context {
    session: BoxedSession,
    prefix: RwLock<String>,
    name: RwLock<String>,
    description: RwLock<String>,
    format_error: RwLock<ErrorFormatter>,
    log_error: RwLock<ErrorLogger>,
}

impl Context {
    /// Creates a context with the default prefix and hooks.
    pub fn new(session: BoxedSession) -> Self {
        Self {
            session,
            prefix: RwLock::new(DEFAULT_PREFIX.to_owned()),
            name: RwLock::new(String::new()),
            description: RwLock::new(String::new()),
            format_error: RwLock::new(default_formatter()),
            log_error: RwLock::new(default_logger()),
        }
    }

    /// Returns the transport session.
    pub fn session(&self) -> &BoxedSession {
        &self.session
    }

    /// Sends a message to a channel.
    pub async fn send(&self, channel_id: &str, content: &str) -> TransportResult<SentMessage> {
        self.session.send_message(channel_id, content).await
    }

    /// Replies in the channel of `message`, mentioning its author.
    pub async fn reply(
        &self,
        message: &MessageCreate,
        content: &str,
    ) -> TransportResult<SentMessage> {
        let content = match &message.author {
            Some(author) => format!("{}, {content}", author.mention()),
            None => content.to_owned(),
        };
        self.send(&message.channel_id, &content).await
    }

    // ─── Settings ─────────────────────────────────────────────────────────────

    /// Returns the command prefix.
    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Sets the command prefix.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write() = prefix.into();
    }

    /// Returns the bot name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Returns the bot description.
    pub fn description(&self) -> String {
        self.description.read().clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self.description.write() = description.into();
    }

    // ─── Hooks ────────────────────────────────────────────────────────────────

    /// Formats a dispatch failure with the current formatting hook.
    pub fn format_error(&self, err: &DispatchError) -> String {
        let format = Arc::clone(&self.format_error.read());
        format(err)
    }

    /// Passes a failure to the current logging hook.
    pub fn log_error(&self, err: &(dyn StdError + 'static)) {
        let log = Arc::clone(&self.log_error.read());
        log(err);
    }

    pub fn set_format_error<F>(&self, format: F)
    where
        F: Fn(&DispatchError) -> String + Send + Sync + 'static,
    {
        *self.format_error.write() = Arc::new(format);
    }

    pub fn set_log_error<F>(&self, log: F)
    where
        F: Fn(&(dyn StdError + 'static)) + Send + Sync + 'static,
    {
        *self.log_error.write() = Arc::new(log);
    }

    pub(crate) fn replace_format_error(&self, format: ErrorFormatter) {
        *self.format_error.write() = format;
    }

    pub(crate) fn replace_log_error(&self, log: ErrorLogger) {
        *self.log_error.write() = log;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("prefix", &*self.prefix.read())
            .field("name", &*self.name.read())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ContextSlot
// =============================================================================

/// Returned when a handler uses its [`ContextSlot`] before registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context has not been injected")]
pub struct ContextUnset;

/// Field type through which a handler object receives the shared [`Context`].
///
/// Registration fills the first `ContextSlot` field of the handler; any later
/// `ContextSlot` fields stay empty.
///
/// ```rust,ignore
/// #[derive(Default, Inject)]
/// struct Admin {
///     ctx: ContextSlot,
/// }
///
/// #[commands]
/// impl Admin {
///     pub async fn prefix(&self, m: &MessageCreate, prefix: String) -> Result<(), BoxError> {
///         let ctx = self.ctx.context()?;
///         ctx.set_prefix(prefix);
///         ctx.reply(m, "done").await?;
///         Ok(())
///     }
/// }
/// ```
#[derive(Clone, Default)]
pub struct ContextSlot(Option<Arc<Context>>);

impl ContextSlot {
    /// Returns the injected context, if any.
    pub fn get(&self) -> Option<&Arc<Context>> {
        self.0.as_ref()
    }

    /// Returns the injected context, or [`ContextUnset`] if the handler was
    /// never registered.
    pub fn context(&self) -> Result<&Arc<Context>, ContextUnset> {
        self.0.as_ref().ok_or(ContextUnset)
    }

    /// Returns `true` once a context has been injected.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Stores `ctx` in the slot.
    pub fn set(&mut self, ctx: &Arc<Context>) {
        self.0 = Some(Arc::clone(ctx));
    }
}

impl fmt::Debug for ContextSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextSlot").field(&self.is_set()).finish()
    }
}
