//! A [`ChatClient`] backed by the terminal.
//!
//! Every stdin line becomes an event in one conversation:
//!
//! ```text
//! hello                  message from the default user
//! @alice /bot ping       message from alice
//! :join bob carol        the default user adds bob and carol
//! :leave bob             the default user removes bob
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hangbot::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Prints everything the bot sends.
#[derive(Debug)]
pub struct ConsoleClient {
    self_id: String,
}

impl ConsoleClient {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
        }
    }
}

#[async_trait]
impl ChatClient for ConsoleClient {
    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> ClientResult<()> {
        println!("[{conversation_id}] {}: {text}", self.self_id);
        Ok(())
    }

    async fn send_image(
        &self,
        conversation_id: &str,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> ClientResult<()> {
        println!(
            "[{conversation_id}] {}: <image, {} bytes> {}",
            self.self_id,
            image.len(),
            caption.unwrap_or_default()
        );
        Ok(())
    }
}

/// Turns stdin lines into events until EOF, then drops the sender.
pub struct ConsoleReader {
    conversation_id: String,
    user_id: String,
    seq: AtomicU64,
}

impl ConsoleReader {
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// The default user adds `participants` to the conversation.
    pub fn join(&self, participants: Vec<String>) -> ConversationEvent {
        self.event(
            &self.user_id,
            EventKind::Membership {
                change: MembershipChange::Join,
                participant_ids: participants,
            },
        )
    }

    /// Parses one input line; blank lines yield nothing.
    pub fn parse_line(&self, line: &str) -> Option<ConversationEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix(':') {
            let mut words = rest.split_whitespace();
            let change = match words.next() {
                Some("join") => MembershipChange::Join,
                Some("leave") => MembershipChange::Leave,
                _ => {
                    warn!(line, "Unknown console directive");
                    return None;
                }
            };
            let participants: Vec<String> = words.map(str::to_string).collect();
            if participants.is_empty() {
                warn!(line, "Membership directive without participants");
                return None;
            }
            return Some(self.event(
                &self.user_id,
                EventKind::Membership {
                    change,
                    participant_ids: participants,
                },
            ));
        }

        if let Some(rest) = line.strip_prefix('@')
            && let Some((user, text)) = rest.split_once(char::is_whitespace)
        {
            return Some(self.event(
                user,
                EventKind::ChatMessage {
                    text: text.trim_start().to_string(),
                },
            ));
        }

        Some(self.event(
            &self.user_id,
            EventKind::ChatMessage {
                text: line.to_string(),
            },
        ))
    }

    /// Reads stdin to EOF.
    pub async fn run(self, events: mpsc::Sender<ConversationEvent>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(event) = self.parse_line(&line)
                        && events.send(event).await.is_err()
                    {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        debug!("Console input closed");
    }

    fn event(&self, user_id: &str, kind: EventKind) -> ConversationEvent {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        ConversationEvent::new(
            format!("console-{seq}"),
            self.conversation_id.as_str(),
            user_id,
            timestamp,
            kind,
        )
    }
}
