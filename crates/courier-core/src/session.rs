//! Session trait and related types.
//!
//! A [`Session`] is the router's only handle on the transport: it sends
//! replies and answers permission questions. Event delivery flows the other
//! way and is not part of this trait; the transport pushes [`BoxedEvent`]s
//! into whatever drives the router.
//!
//! [`BoxedEvent`]: crate::event::BoxedEvent

use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// Permission bits of a user in a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);

    /// Creates a permission set from raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the administrator bit is set.
    pub const fn is_admin(self) -> bool {
        self.contains(Self::ADMINISTRATOR)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Receipt of a sent message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

/// The transport seam.
///
/// Implementations own their connection and any caching of member, role or
/// channel metadata; the router never caches what a session returns.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Sends a plain text message to a channel.
    async fn send_message(&self, channel_id: &str, content: &str) -> TransportResult<SentMessage>;

    /// Resolves the effective permissions of a user in a channel.
    async fn user_permissions(&self, channel_id: &str, user_id: &str)
    -> TransportResult<Permissions>;
}

/// A shared Session trait object.
pub type BoxedSession = Arc<dyn Session>;
