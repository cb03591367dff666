//! Event system for the Courier router.
//!
//! This module provides the core event infrastructure:
//!
//! - [`Event`] - Base trait for all events
//! - [`EventKind`] - Identity of a concrete event type, used as a dispatch key
//! - [`BoxedEvent`] - Type-erased, cheaply clonable event handle
//! - [`MessageCreate`], [`MessageUpdate`], [`MessageDelete`] - Chat events
//!
//! Only [`MessageCreate`] is tokenized and routed by command name. Every
//! other kind is delivered to the handlers that declared it, by exact type.

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Core Event Trait
// ============================================================================

/// The base trait for all events delivered by a transport.
///
/// Events are type-erased behind [`BoxedEvent`] and downcast back to their
/// concrete type with [`BoxedEvent::downcast_ref`].
///
/// The id accessors are used for permission checks. An event that has no
/// notion of a channel or an acting user keeps the default `None`, and is
/// then never considered to come from an administrator.
pub trait Event: Any + Send + Sync {
    /// Returns the human-readable name of this event type.
    fn event_name(&self) -> &'static str;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the channel the event happened in, if any.
    fn channel_id(&self) -> Option<&str> {
        None
    }

    /// Returns the user that caused the event, if any.
    fn user_id(&self) -> Option<&str> {
        None
    }

    /// Returns the guild the event happened in, if any.
    fn guild_id(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// Event Kind
// ============================================================================

/// Identity of a concrete event type.
///
/// Two kinds are equal when they refer to the same Rust type; the name is
/// carried along for logs and error messages only.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// Returns the kind of `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Returns the [`TypeId`] of the event type.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type name of the event type.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is the canonical chat-message kind.
    pub fn is_message(&self) -> bool {
        self.id == TypeId::of::<MessageCreate>()
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl std::hash::Hash for EventKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Boxed Event
// ============================================================================

/// A type-erased container for events that supports runtime downcasting.
///
/// `BoxedEvent` wraps any type implementing [`Event`] in an `Arc`, so the
/// same event can be handed to several handlers without copying.
///
/// It implements `Deref<Target = dyn Event>`, so trait methods can be called
/// directly:
///
/// ```rust,ignore
/// let event: BoxedEvent = BoxedEvent::new(message);
/// let name = event.event_name();
/// let channel = event.channel_id();
/// ```
#[derive(Clone)]
pub struct BoxedEvent {
    kind: EventKind,
    inner: Arc<dyn Event>,
}

impl BoxedEvent {
    /// Creates a new `BoxedEvent` from any type implementing `Event`.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            kind: EventKind::of::<E>(),
            inner: Arc::new(event),
        }
    }

    /// Returns the kind of the wrapped event.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns `true` if the wrapped event is an `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.kind == EventKind::of::<E>()
    }

    /// Returns the inner `Arc<dyn Event>`.
    pub fn inner(&self) -> &Arc<dyn Event> {
        &self.inner
    }

    /// Attempts to downcast to a concrete event type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.inner.as_any().downcast_ref()
    }
}

impl Deref for BoxedEvent {
    type Target = dyn Event;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("event_name", &self.event_name())
            .field("kind", &self.kind)
            .finish()
    }
}

// ============================================================================
// Chat Events
// ============================================================================

/// A chat user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Returns the mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A chat message as carried by message events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<User>,
}

/// A message was posted. This is the only event kind routed by command name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    #[serde(flatten)]
    pub message: Message,
}

/// A message was edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    #[serde(flatten)]
    pub message: Message,
}

/// A message was deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

impl MessageCreate {
    /// Creates a message event with the given channel, author and content.
    pub fn new(channel_id: impl Into<String>, author: User, content: impl Into<String>) -> Self {
        Self {
            message: Message {
                channel_id: channel_id.into(),
                author: Some(author),
                content: content.into(),
                ..Default::default()
            },
        }
    }
}

impl Deref for MessageCreate {
    type Target = Message;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl Deref for MessageUpdate {
    type Target = Message;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

macro_rules! impl_message_event {
    ($ty:ty, $name:literal) => {
        impl Event for $ty {
            fn event_name(&self) -> &'static str {
                $name
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn channel_id(&self) -> Option<&str> {
                Some(&self.message.channel_id)
            }

            fn user_id(&self) -> Option<&str> {
                self.message.author.as_ref().map(|a| a.id.as_str())
            }

            fn guild_id(&self) -> Option<&str> {
                self.message.guild_id.as_deref()
            }
        }
    };
}

impl_message_event!(MessageCreate, "message_create");
impl_message_event!(MessageUpdate, "message_update");

impl Event for MessageDelete {
    fn event_name(&self) -> &'static str {
        "message_delete"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn channel_id(&self) -> Option<&str> {
        Some(&self.channel_id)
    }

    fn guild_id(&self) -> Option<&str> {
        self.guild_id.as_deref()
    }
}
