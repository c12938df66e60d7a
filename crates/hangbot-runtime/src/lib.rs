//! # Hangbot Runtime
//!
//! Everything around the bot that a process needs:
//!
//! - [`config`]: layered process settings (files, environment, profiles)
//! - [`logging`]: the `tracing` subscriber built from those settings
//! - [`BotRuntime`]: loads the config and memory documents, builds the
//!   [`Bot`](hangbot_framework::Bot), loads plugins, starts the configured
//!   webhook listeners and feeds incoming events to the dispatcher until
//!   shutdown
//!
//! ```ignore
//! use hangbot_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, events) = my_protocol::connect().await?;
//!     let runtime = BotRuntime::builder().build(client)?;
//!
//!     // Run until the client disconnects or Ctrl+C
//!     runtime.run(events).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Settings};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BotRuntime, RuntimeBuilder, wait_for_shutdown};
