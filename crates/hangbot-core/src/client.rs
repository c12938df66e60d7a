//! The seam between the bot and the chat-protocol client library.
//!
//! Connection management, authentication and event parsing all live in the
//! client. The bot only needs to know who it is and how to post into a
//! conversation; incoming events reach the runtime through a channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientResult;

/// Operations the bot needs from the protocol client.
///
/// # Example
///
/// ```rust,ignore
/// struct Console;
///
/// #[async_trait]
/// impl ChatClient for Console {
///     fn self_id(&self) -> &str {
///         "console-bot"
///     }
///
///     async fn send_message(&self, conversation_id: &str, text: &str) -> ClientResult<()> {
///         println!("[{conversation_id}] {text}");
///         Ok(())
///     }
///
///     async fn send_image(
///         &self,
///         conversation_id: &str,
///         image: Vec<u8>,
///         caption: Option<&str>,
///     ) -> ClientResult<()> {
///         println!("[{conversation_id}] <{} byte image> {}", image.len(), caption.unwrap_or(""));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// The bot's own user id on the platform.
    fn self_id(&self) -> &str;

    /// Posts a text message to a conversation.
    async fn send_message(&self, conversation_id: &str, text: &str) -> ClientResult<()>;

    /// Uploads an image to a conversation, with an optional caption.
    async fn send_image(
        &self,
        conversation_id: &str,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> ClientResult<()>;
}

/// Shared, type-erased client.
pub type BoxedClient = Arc<dyn ChatClient>;
