use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use tracing::debug;

use crate::error::WebhookResult;
use hangbot_framework::Bot;

/// Body of a webhook request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookPayload {
    /// Text to post.
    #[serde(default)]
    pub message: Option<String>,
    /// Older spelling of `message`; used when `message` is absent.
    #[serde(default)]
    pub echo: Option<String>,
    /// Base64-encoded image bytes.
    #[serde(default)]
    pub image: Option<String>,
}

impl WebhookPayload {
    /// The text to post, if any.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.echo.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// What a webhook body turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A text message was sent.
    Text,
    /// An image was uploaded, with the text as its caption.
    Image,
    /// A `sending` handler vetoed the text.
    Suppressed,
    /// The body carried nothing to send.
    Empty,
}

/// Parses a webhook body and forwards it to `conversation_id`.
pub async fn deliver(bot: &Bot, conversation_id: &str, body: &[u8]) -> WebhookResult<Delivery> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;

    if let Some(encoded) = payload.image.as_deref() {
        let image = general_purpose::STANDARD.decode(encoded.trim())?;
        debug!(conversation = %conversation_id, bytes = image.len(), "Webhook image");
        bot.send_image(conversation_id, image, payload.text()).await?;
        return Ok(Delivery::Image);
    }

    let Some(text) = payload.text() else {
        return Ok(Delivery::Empty);
    };
    if bot.send_message(conversation_id, text).await? {
        Ok(Delivery::Text)
    } else {
        Ok(Delivery::Suppressed)
    }
}
