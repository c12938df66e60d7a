//! # hangbot
//!
//! A plugin-driven chat bot. Plugins subscribe handlers to event categories
//! at a priority and register commands; every incoming event is routed
//! through them in priority order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  ConversationEvent  ┌────────────┐     ┌──────────────────────────┐
//! │ ChatClient  │────────────────────▶│  Runtime   │────▶│ Dispatcher               │
//! │ (protocol)  │                     │ (one task  │     │  priority 0..100 handlers│──▶ Flow
//! └─────────────┘                     │  per event)│     │  command resolver (50)   │──▶ commands
//!        ▲                            └────────────┘     └──────────────────────────┘
//!        │ send_message / send_image           ▲
//!        └──────────────────────────── Bot ────┘── webhooks (axum)
//! ```
//!
//! - **Runtime**: settings, logging, the two JSON documents, the event loop
//! - **Plugins**: static descriptors whose `init` registers handlers and commands
//! - **Handlers**: async functions returning a [`Flow`](framework::Flow) signal
//! - **Commands**: async functions invoked by name after a command alias
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hangbot::prelude::*;
//!
//! async fn hello(ctx: CommandContext) -> Result<(), BoxError> {
//!     ctx.reply("hello!").await?;
//!     Ok(())
//! }
//!
//! fn init(scope: &PluginScope<'_>) -> Result<(), BoxError> {
//!     scope.register_user_command(["hello", "hi"], hello);
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, events) = my_protocol::connect().await?;
//!     let runtime = BotRuntime::builder().build(client)?;
//!     runtime.register_plugin(PluginDescriptor {
//!         name: "hello",
//!         desc: "says hello",
//!         init,
//!     });
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `builtin-plugins`: the `core` and `plugins` plugins (default)
//! - `toml-config`: `hangbot.toml` settings files (default)
//! - `yaml-config`: `hangbot.yaml` settings files
//! - `json-log`: JSON log output

pub use hangbot_core as core;
pub use hangbot_framework as framework;
pub use hangbot_runtime as runtime;
pub use hangbot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hangbot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hangbot_runtime::{BotRuntime, RuntimeBuilder};

    // Plugin system
    pub use hangbot_framework::{BoxError, PluginDescriptor, PluginScope};

    // Handlers and commands
    pub use hangbot_framework::{Bot, CommandContext, DEFAULT_PRIORITY, Flow, HandlerContext};

    // Events and the protocol client seam
    pub use hangbot_core::{
        BoxedClient, ChatClient, ClientError, ClientResult, ConversationEvent, EventCategory,
        EventKind, MembershipChange,
    };
}
