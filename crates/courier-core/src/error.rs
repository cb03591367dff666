//! Error types shared by the router and its transports.

use thiserror::Error;

/// Boxed error returned by command handlers.
///
/// Anything a handler method returns in its `Err` arm is converted into this
/// type and passed through the dispatcher untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while talking to the transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The session is not connected.
    #[error("session is not connected")]
    NotConnected,

    /// Message send failed.
    #[error("failed to send message to channel '{channel_id}': {reason}")]
    SendFailed {
        /// Target channel.
        channel_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Permission lookup failed.
    #[error("failed to resolve permissions of '{user_id}' in channel '{channel_id}': {reason}")]
    PermissionLookup {
        /// Channel the lookup was made in.
        channel_id: String,
        /// User the lookup was made for.
        user_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Creates a send failure for the given channel.
    pub fn send_failed(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a catch-all transport error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_failed_display() {
        let err = TransportError::send_failed("42", "rate limited");
        assert_eq!(
            err.to_string(),
            "failed to send message to channel '42': rate limited"
        );
    }

    #[test]
    fn test_transport_error_boxes() {
        let boxed: BoxError = TransportError::NotConnected.into();
        assert_eq!(boxed.to_string(), "session is not connected");
    }
}
