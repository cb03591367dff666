//! Runtime for courier bots.
//!
//! This crate provides:
//! - The event loop ([`Runtime`]) feeding a [`courier::Router`]
//! - Layered configuration ([`config`])
//! - Logging setup ([`logging`])
//!
//! ```rust,ignore
//! use courier::Router;
//! use courier_runtime::Runtime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = Router::new(session.clone(), Commands::default())?;
//!     let runtime = Runtime::builder().build(router)?;
//!
//!     let (tx, events) = courier_runtime::channel(64);
//!     gateway.forward_to(tx);
//!
//!     // Runs until Ctrl+C
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{BotConfig, ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig};
pub use error::{ReplyFailed, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{EventSender, EventStream, Runtime, RuntimeBuilder, channel};

pub use tracing;
pub use tracing_subscriber;
