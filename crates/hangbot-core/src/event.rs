//! Conversation events and their dispatch categories.
//!
//! The protocol client turns whatever arrives on the wire into a
//! [`ConversationEvent`]. The dispatcher never looks at the payload directly;
//! it asks [`classify`] for the set of [`EventCategory`] tags and collects the
//! handlers registered under those tags.
//!
//! ```text
//! ConversationEvent { id, conversation_id, user_id, timestamp, kind }
//! └── EventKind
//!     ├── ChatMessage { text }          → message + allmessages
//!     ├── Membership { change, ids }    → membership
//!     ├── Rename { old, new }           → rename
//!     ├── Typing { status }             → typing
//!     ├── Watermark { read_timestamp }  → watermark
//!     ├── Call { kind }                 → call
//!     └── Sending(OutgoingMessage)      → sending
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::UnknownCategory;

// ============================================================================
// Event Categories
// ============================================================================

/// The tag used as the dispatch key for handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Chat messages sent by someone other than the bot.
    Message,
    /// Participants joining or leaving a conversation.
    Membership,
    /// Conversation renames.
    Rename,
    /// Typing notifications.
    Typing,
    /// Read-receipt watermarks.
    Watermark,
    /// Voice/video call notices.
    Call,
    /// Outgoing messages the bot is about to send.
    Sending,
    /// Every chat message, including the bot's own.
    AllMessages,
}

impl EventCategory {
    /// All categories, in declaration order.
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Message,
        EventCategory::Membership,
        EventCategory::Rename,
        EventCategory::Typing,
        EventCategory::Watermark,
        EventCategory::Call,
        EventCategory::Sending,
        EventCategory::AllMessages,
    ];

    /// Returns the lowercase name used in logs and plugin code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Membership => "membership",
            Self::Rename => "rename",
            Self::Typing => "typing",
            Self::Watermark => "watermark",
            Self::Call => "call",
            Self::Sending => "sending",
            Self::AllMessages => "allmessages",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

// ============================================================================
// Event Payloads
// ============================================================================

/// Whether a membership change added or removed participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipChange {
    Join,
    Leave,
}

/// Typing state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingStatus {
    Started,
    Paused,
    Stopped,
}

/// A message on its way out, visible to `sending` handlers.
///
/// The text sits behind a lock so a handler can rewrite it before the
/// client sees it. Clones share the same text.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    conversation_id: String,
    text: Arc<Mutex<String>>,
}

impl OutgoingMessage {
    /// Creates an outgoing message for `conversation_id`.
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: Arc::new(Mutex::new(text.into())),
        }
    }

    /// Destination conversation.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Current text, including edits made by earlier handlers.
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// Replaces the text that will be sent.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock() = text.into();
    }
}

/// The payload of a [`ConversationEvent`].
#[derive(Debug, Clone)]
pub enum EventKind {
    /// A text message posted in the conversation.
    ChatMessage { text: String },
    /// Participants joined or left.
    Membership {
        change: MembershipChange,
        participant_ids: Vec<String>,
    },
    /// The conversation was renamed.
    Rename { old_name: String, new_name: String },
    /// Someone started or stopped typing.
    Typing { status: TypingStatus },
    /// Someone read the conversation up to `read_timestamp`.
    Watermark { read_timestamp: i64 },
    /// A call started or ended; `kind` is the platform's own label.
    Call { kind: String },
    /// The bot is about to send a message.
    Sending(OutgoingMessage),
}

// ============================================================================
// ConversationEvent
// ============================================================================

/// One event delivered by the protocol client.
///
/// A single `Arc<ConversationEvent>` is shared by every handler invoked for
/// that event, so all of them observe the same snapshot.
#[derive(Debug, Clone)]
pub struct ConversationEvent {
    /// Platform event id.
    pub id: String,
    /// Conversation the event belongs to.
    pub conversation_id: String,
    /// The user that caused the event.
    pub user_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// What happened.
    pub kind: EventKind,
}

impl ConversationEvent {
    /// Creates an event with the given identity and payload.
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        timestamp: i64,
        kind: EventKind,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            timestamp,
            kind,
        }
    }

    /// Shorthand for a chat message event.
    pub fn message(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            conversation_id,
            user_id,
            0,
            EventKind::ChatMessage { text: text.into() },
        )
    }

    /// Returns the message text for chat messages, `None` otherwise.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ChatMessage { text } => Some(text),
            _ => None,
        }
    }

    /// Returns `true` if the bot itself caused this event.
    pub fn is_self(&self, self_id: &str) -> bool {
        self.user_id == self_id
    }

    /// Returns `true` if this is a membership change that lists `user_id`.
    pub fn involves(&self, user_id: &str) -> bool {
        match &self.kind {
            EventKind::Membership {
                participant_ids, ..
            } => participant_ids.iter().any(|id| id == user_id),
            _ => false,
        }
    }

    /// Returns the outgoing message carried by a `sending` event.
    pub fn outgoing(&self) -> Option<&OutgoingMessage> {
        match &self.kind {
            EventKind::Sending(msg) => Some(msg),
            _ => None,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Derives the dispatch categories of `event`.
///
/// Messages written by the bot (`self_id`) only reach `allmessages`
/// handlers, which keeps ordinary `message` handlers from reacting to the
/// bot's own output.
pub fn classify(event: &ConversationEvent, self_id: &str) -> Vec<EventCategory> {
    match &event.kind {
        EventKind::ChatMessage { .. } if event.is_self(self_id) => {
            vec![EventCategory::AllMessages]
        }
        EventKind::ChatMessage { .. } => {
            vec![EventCategory::Message, EventCategory::AllMessages]
        }
        EventKind::Membership { .. } => vec![EventCategory::Membership],
        EventKind::Rename { .. } => vec![EventCategory::Rename],
        EventKind::Typing { .. } => vec![EventCategory::Typing],
        EventKind::Watermark { .. } => vec![EventCategory::Watermark],
        EventKind::Call { .. } => vec![EventCategory::Call],
        EventKind::Sending(_) => vec![EventCategory::Sending],
    }
}
