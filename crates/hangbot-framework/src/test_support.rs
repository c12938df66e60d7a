//! Test doubles shared by the unit tests of this crate.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::context::Bot;
use crate::store::JsonStore;
use hangbot_core::{ChatClient, ClientResult};

pub(crate) const SELF_ID: &str = "bot-self";

/// A client that records everything it is asked to send.
#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    sent: Mutex<Vec<(String, String)>>,
    images: Mutex<Vec<(String, Vec<u8>, Option<String>)>>,
}

impl RecordingClient {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    pub(crate) fn images(&self) -> Vec<(String, Vec<u8>, Option<String>)> {
        self.images.lock().clone()
    }

    pub(crate) fn self_id_string(&self) -> String {
        SELF_ID.to_string()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    fn self_id(&self) -> &str {
        SELF_ID
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

/// A bot over in-memory documents, with `config` as its config document.
pub(crate) fn test_bot(config: Value) -> (Bot, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    let bot = Bot::new(
        client.clone(),
        JsonStore::in_memory(config),
        JsonStore::in_memory(Value::Object(Default::default())),
    );
    (bot, client)
}

#[tokio::test]
async fn test_send_image_bypasses_sending_handlers() {
    let (bot, client) = test_bot(serde_json::json!({}));
    bot.send_image("c1", vec![1, 2, 3], Some("caption"))
        .await
        .unwrap();
    assert_eq!(
        client.images(),
        vec![("c1".to_string(), vec![1, 2, 3], Some("caption".to_string()))]
    );
}
