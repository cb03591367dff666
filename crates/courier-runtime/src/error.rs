//! Runtime error types.

use thiserror::Error;

use courier::{ConfigurationError, DispatchError};

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registering a handler failed.
    #[error("failed to register commands: {0}")]
    Registration(#[from] ConfigurationError),

    /// A shutdown signal handler could not be installed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A failed command whose error reply could not be sent.
///
/// Passed to the context's logging hook, followed by the send error itself.
#[derive(Error, Debug)]
#[error("{reply}: {source}")]
pub struct ReplyFailed {
    /// The formatted reply that was not delivered.
    pub reply: String,
    #[source]
    pub source: DispatchError,
}
