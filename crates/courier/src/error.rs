//! Error types for the Courier router.
//!
//! Errors are split by phase. [`ConfigurationError`] can only come out of
//! registration and [`DispatchError`] only out of [`Router::dispatch`], so a
//! dispatch can never report a malformed handler.
//!
//! [`Router::dispatch`]: crate::Router::dispatch

use thiserror::Error;

use courier_core::BoxError;

/// Errors that can occur while registering handlers.
///
/// All of these are fatal to startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The handler has no field to receive the shared context.
    #[error("handler '{handler}' has no ContextSlot field")]
    MissingContextSlot {
        /// Handler type name.
        handler: &'static str,
    },

    /// Two commands of one handler resolve to the same name.
    #[error("handler '{handler}' declares command '{name}' more than once")]
    DuplicateCommand {
        /// Handler type name.
        handler: &'static str,
        /// The clashing command name.
        name: String,
    },

    /// A subcommand with the same name is already registered.
    #[error("subcommand '{name}' is already registered")]
    DuplicateSubcommand {
        /// The clashing subcommand name.
        name: String,
    },

    /// A parameter type has no registered coercion.
    #[error("command '{command}' takes an argument of unsupported type '{type_name}'")]
    UnresolvedArgument {
        /// Command name.
        command: String,
        /// The unsupported type.
        type_name: &'static str,
    },

    /// A whole-line argument is combined with other arguments.
    #[error("command '{command}' must take whole-line argument '{type_name}' as its only argument")]
    ManualNotSole {
        /// Command name.
        command: String,
        /// The whole-line type.
        type_name: &'static str,
    },

    /// A handler for a non-message event declares arguments.
    #[error("command '{command}' handles '{event}' and cannot take arguments")]
    EventArguments {
        /// Command name.
        command: String,
        /// Event type name.
        event: &'static str,
    },

    /// An identifier is empty once its directives are removed.
    #[error("identifier '{identifier}' has an empty name")]
    EmptyName {
        /// The identifier as declared.
        identifier: String,
    },
}

/// Errors returned by [`Router::dispatch`](crate::Router::dispatch).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No command matches the input, or the caller may not see it.
    #[error(
        "unknown command: {}{command}",
        parent.as_deref().map(|p| format!("{p} ")).unwrap_or_default()
    )]
    UnknownCommand {
        /// The token that failed to match.
        command: String,
        /// The subcommand the lookup happened in.
        parent: Option<String>,
        /// Prefix in effect for the message.
        prefix: String,
    },

    /// The arguments do not fit the command.
    #[error("invalid usage at argument {index}: {message}")]
    InvalidUsage {
        /// Index of the offending token, the command name being index 0.
        index: usize,
        /// What went wrong.
        message: String,
        /// Every token of the message.
        args: Vec<String>,
        /// Prefix in effect for the message.
        prefix: String,
    },

    /// The command itself failed.
    #[error(transparent)]
    Handler(BoxError),
}

impl DispatchError {
    /// Returns `true` for errors caused by the input rather than by a handler.
    pub fn is_usage(&self) -> bool {
        !matches!(self, Self::Handler(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_display() {
        let err = DispatchError::UnknownCommand {
            command: "nope".into(),
            parent: None,
            prefix: "~".into(),
        };
        assert_eq!(err.to_string(), "unknown command: nope");

        let err = DispatchError::UnknownCommand {
            command: "nope".into(),
            parent: Some("admin".into()),
            prefix: "~".into(),
        };
        assert_eq!(err.to_string(), "unknown command: admin nope");
        assert!(err.is_usage());
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = DispatchError::Handler("database is down".into());
        assert_eq!(err.to_string(), "database is down");
        assert!(!err.is_usage());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::UnresolvedArgument {
            command: "roll".into(),
            type_name: "std::time::Duration",
        };
        assert_eq!(
            err.to_string(),
            "command 'roll' takes an argument of unsupported type 'std::time::Duration'"
        );
    }
}
