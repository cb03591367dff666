//! # Courier Core
//!
//! Shared vocabulary for the Courier command router.
//!
//! This crate holds everything the router needs to know about the outside
//! world, and nothing more:
//!
//! - **Event System**: type-erased events with runtime downcasting
//!   ([`Event`], [`BoxedEvent`], [`EventKind`]) and the chat events the router
//!   understands out of the box ([`MessageCreate`], [`MessageUpdate`],
//!   [`MessageDelete`]).
//! - **Session Seam**: the [`Session`] trait a transport implements so the
//!   router can reply and look up permissions.
//! - **Errors**: [`TransportError`] and the [`BoxError`] alias used for
//!   handler failures.
//!
//! ```text
//! ┌─────────────┐  BoxedEvent  ┌────────────┐  &self, &E, args  ┌───────────┐
//! │  Transport  │─────────────▶│   Router   │──────────────────▶│  Handler  │
//! │  (Session)  │◀─────────────│ (courier)  │                   │  object   │
//! └─────────────┘ send_message └────────────┘                   └───────────┘
//! ```

pub mod error;
pub mod event;
pub mod session;

pub use error::{BoxError, TransportError, TransportResult};
pub use event::{BoxedEvent, Event, EventKind, Message, MessageCreate, MessageDelete, MessageUpdate, User};
pub use session::{BoxedSession, Permissions, SentMessage, Session};
