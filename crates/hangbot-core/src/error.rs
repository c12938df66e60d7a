//! Error types shared by the hangbot crates.

use thiserror::Error;

/// Errors reported by a [`ChatClient`](crate::ChatClient) implementation.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The client has no live connection to the platform.
    #[error("not connected")]
    NotConnected,

    /// The conversation does not exist or the bot is not a member.
    #[error("unknown conversation '{0}'")]
    UnknownConversation(String),

    /// The platform rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Any other failure inside the client.
    #[error("client error: {0}")]
    Other(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Returned when parsing an [`EventCategory`](crate::EventCategory) name fails.
#[derive(Debug, Clone, Error)]
#[error("unknown event category '{0}'")]
pub struct UnknownCategory(pub String);
