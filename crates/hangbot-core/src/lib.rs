//! # hangbot core
//!
//! Leaf types of the hangbot chat bot:
//!
//! - **Events**: [`ConversationEvent`] and its [`EventKind`] payloads
//! - **Categories**: [`EventCategory`] tags and the [`classify`] function the
//!   dispatcher uses as its routing key
//! - **Client seam**: the [`ChatClient`] trait implemented by the external
//!   protocol library
//!
//! ```text
//! ┌──────────────┐  ConversationEvent  ┌────────────┐     ┌──────────┐
//! │  ChatClient  │────────────────────▶│ Dispatcher │────▶│ Handlers │
//! │  (protocol)  │◀────────────────────│ (framework)│◀────│          │
//! └──────────────┘    send_message     └────────────┘     └──────────┘
//! ```

pub mod client;
pub mod error;
pub mod event;

pub use client::{BoxedClient, ChatClient};
pub use error::{ClientError, ClientResult, UnknownCategory};
pub use event::{
    ConversationEvent, EventCategory, EventKind, MembershipChange, OutgoingMessage, TypingStatus,
    classify,
};
