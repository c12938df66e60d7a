//! # Hangbot Transport
//!
//! Inbound HTTP for the hangbot chat bot: webhook listeners that let outside
//! systems (CI, monitoring, cron jobs) post text or images into a
//! conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  external system    │  POST /{conversation_id} {"message": ...}
//! ├─────────────────────┤
//! │  hangbot-transport  │  <- This crate (axum listeners)
//! ├─────────────────────┤
//! │  hangbot-framework  │  Bot::send_message / Bot::send_image
//! ├─────────────────────┤
//! │  ChatClient         │  the protocol client
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hangbot_transport::start_configured;
//!
//! // Starts one listener per entry of the `webhooks` config key.
//! let handles = start_configured(&bot).await;
//! // …later…
//! for handle in handles {
//!     handle.stop();
//! }
//! ```

pub mod error;
pub mod http;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{WebhookError, WebhookResult};
pub use http::{
    Delivery, ListenerHandle, WEBHOOKS_KEY, WebhookListenerConfig, WebhookPayload, deliver,
    listener_configs, start_configured, start_webhook, start_webhooks, webhook_router,
};
