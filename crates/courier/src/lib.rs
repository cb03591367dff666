//! # Courier
//!
//! Command registration and dispatch for event-driven chat bots.
//!
//! A handler object is a plain struct with a [`ContextSlot`] field. Its public
//! methods become commands:
//!
//! ```rust,ignore
//! use courier::{ContextSlot, Inject, MessageCreate, commands};
//!
//! #[derive(Default, Inject)]
//! struct Commands {
//!     ctx: ContextSlot,
//! }
//!
//! #[commands]
//! impl Commands {
//!     /// Replies with the sum of two numbers.
//!     pub async fn add(&self, m: &MessageCreate, a: i64, b: i64) -> anyhow::Result<()> {
//!         self.ctx.context()?.reply(m, &format!("{}", a + b)).await?;
//!         Ok(())
//!     }
//! }
//!
//! let router = Router::new(session, Commands::default())?;
//! router.dispatch(event).await?;
//! ```
//!
//! This layer provides:
//! - Directive markers in identifiers ([`flags`])
//! - Type-directed argument coercion ([`argument`])
//! - CSV-style input tokenizing ([`tokenizer`])
//! - Command table construction ([`registrar`])
//! - The two-level command namespace ([`router`], [`subcommand`])
//! - Event routing, permission gating and invocation ([`dispatcher`])

extern crate self as courier;

pub mod argument;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod flags;
pub mod registrar;
pub mod router;
pub mod subcommand;
pub mod tokenizer;

pub use argument::{
    ArgumentRegistry, ArgumentSpec, Arguments, CoercionError, ManualParseable, Parseable,
    RawArguments, ScalarKind,
};
pub use context::{Context, ContextSlot, ErrorFormatter, ErrorLogger};
pub use error::{ConfigurationError, DispatchError};
pub use flags::{Flags, parse_flags};
pub use registrar::{ArgumentPlan, Command, CommandBuilder, CommandSet, Inject, Registrar};
pub use router::{Router, RouterBuilder};
pub use subcommand::Subcommand;
pub use tokenizer::{TokenizeError, tokenize};

pub use courier_core::{
    BoxError, BoxedEvent, BoxedSession, Event, EventKind, Message, MessageCreate, MessageDelete,
    MessageUpdate, Permissions, SentMessage, Session, TransportError, TransportResult, User,
};

pub use async_trait::async_trait;

#[cfg(feature = "macros")]
pub use courier_macros::{Inject, commands};

/// Items used by code generated from `#[commands]` and `#[derive(Inject)]`.
#[doc(hidden)]
pub mod __private {
    pub use futures::FutureExt;
    pub use futures::future::BoxFuture;
}
