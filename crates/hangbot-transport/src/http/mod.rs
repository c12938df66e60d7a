//! Webhook HTTP listeners.
//!
//! Each listener is a minimal axum server with a single route:
//!
//! ```text
//! POST /{conversation_id}      {"message": "deploy finished"}
//! POST /{conversation_id}/     {"image": "<base64>", "message": "build graph"}
//! ```
//!
//! The response is always `200 OK`. The body is parsed and forwarded to the
//! conversation in a background task, so a slow chat client never blocks the
//! caller. Payload errors only show up in the log.

pub mod config;
pub mod payload;
pub mod server;

pub use config::{WEBHOOKS_KEY, WebhookListenerConfig, listener_configs};
pub use payload::{Delivery, WebhookPayload, deliver};
pub use server::{ListenerHandle, start_configured, start_webhook, start_webhooks, webhook_router};
