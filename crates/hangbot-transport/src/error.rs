//! Error types for the webhook listeners.

use thiserror::Error;

use hangbot_core::ClientError;

/// Errors raised while starting a listener or handling a webhook body.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The listener spec in the config document is unusable.
    #[error("invalid webhook listener spec: {0}")]
    InvalidSpec(String),

    /// Binding the listening socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The request body is not a JSON object of the expected shape.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The `image` field is not valid base64.
    #[error("invalid base64 image: {0}")]
    InvalidImage(#[from] base64::DecodeError),

    /// Forwarding to the conversation failed.
    #[error("delivery failed: {0}")]
    Client(#[from] ClientError),
}

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;
