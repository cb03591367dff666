//! Configuration for the runtime.
//!
//! Figment-based layered loading of [`CourierConfig`]: command settings for
//! the router and logging settings.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file, validate};
pub use schema::{
    BotConfig, CourierConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
