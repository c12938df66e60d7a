use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use hangbot_core::{ChatClient, ClientResult};
use hangbot_framework::{Bot, JsonStore};

#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    sent: Mutex<Vec<(String, String)>>,
    images: Mutex<Vec<(String, Vec<u8>, Option<String>)>>,
}

impl RecordingClient {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub(crate) fn images(&self) -> Vec<(String, Vec<u8>, Option<String>)> {
        self.images.lock().clone()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    fn self_id(&self) -> &str {
        "bot-self"
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> ClientResult<()> {
        self.sent
            .lock()
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(
        &self,
        conversation_id: &str,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> ClientResult<()> {
        self.images.lock().push((
            conversation_id.to_string(),
            image,
            caption.map(str::to_string),
        ));
        Ok(())
    }
}

pub(crate) fn test_bot() -> (Bot, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    let bot = Bot::new(
        client.clone(),
        JsonStore::in_memory(json!({})),
        JsonStore::in_memory(json!({})),
    );
    (bot, client)
}
