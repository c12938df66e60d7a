//! The shared bot context and the per-call contexts handed to callbacks.
//!
//! - [`Bot`] is the one-per-process handle that owns the protocol client,
//!   the [`Registry`], both JSON documents and the plugin manager. It is
//!   cheap to clone and is passed explicitly to everything that needs it.
//! - [`HandlerContext`] is what an event handler receives: the bot, the
//!   shared event snapshot, the category it matched and the parsed command,
//!   if the message was one.
//! - [`CommandContext`] is what a command callback receives: the bot, the
//!   triggering event and the argument tokens after the command name.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, info};

use crate::command::{CommandResolver, ParsedCommand};
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::StoreResult;
use crate::plugin::PluginManager;
use crate::registry::Registry;
use crate::store::JsonStore;
use hangbot_core::{
    BoxedClient, ClientResult, ConversationEvent, EventCategory, EventKind, OutgoingMessage,
};

/// Aliases used when neither the memory nor the config document sets any.
pub const DEFAULT_COMMAND_ALIASES: &[&str] = &["/bot"];

/// Memory (then config) key holding the list of command aliases.
pub const COMMAND_ALIASES_KEY: &str = "command_aliases";

/// Config key holding the list of admin user ids.
pub const ADMINS_KEY: &str = "admins";

/// Config key holding per-conversation overrides.
pub const CONVERSATIONS_KEY: &str = "conversations";

// =============================================================================
// Bot
// =============================================================================

struct BotInner {
    client: BoxedClient,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    config: JsonStore,
    memory: JsonStore,
    plugins: PluginManager,
    outgoing_seq: AtomicU64,
}

/// The shared bot context.
///
/// Exactly one exists per process. Cloning only bumps a reference count.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    /// Builds the bot context around a client and the two documents.
    ///
    /// The command resolver is installed immediately; plugins are registered
    /// with [`PluginManager::register`] and loaded later.
    pub fn new(client: BoxedClient, config: JsonStore, memory: JsonStore) -> Self {
        let registry = Arc::new(Registry::new());
        CommandResolver::install(&registry);

        let plugins = PluginManager::new();
        #[cfg(feature = "builtin-plugins")]
        plugins.register_builtins();

        info!(self_id = %client.self_id(), "Bot context created");

        Self {
            inner: Arc::new(BotInner {
                dispatcher: Dispatcher::new(Arc::clone(&registry)),
                client,
                registry,
                config,
                memory,
                plugins,
                outgoing_seq: AtomicU64::new(0),
            }),
        }
    }

    /// The bot's own user id.
    pub fn self_id(&self) -> &str {
        self.inner.client.self_id()
    }

    /// The protocol client.
    pub fn client(&self) -> &BoxedClient {
        &self.inner.client
    }

    /// The handler and command registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// The static configuration document.
    pub fn config(&self) -> &JsonStore {
        &self.inner.config
    }

    /// The mutable runtime-state document.
    pub fn memory(&self) -> &JsonStore {
        &self.inner.memory
    }

    /// The plugin manager.
    pub fn plugins(&self) -> &PluginManager {
        &self.inner.plugins
    }

    // ─── Event handling ──────────────────────────────────────────────────────

    /// Processes one incoming event to completion.
    ///
    /// This is the body of the per-event task spawned by the runtime.
    pub async fn handle_event(&self, event: ConversationEvent) -> DispatchReport {
        self.inner.dispatcher.dispatch(self, Arc::new(event)).await
    }

    /// Sends a text message, letting `sending` handlers rewrite or veto it.
    ///
    /// Returns `Ok(false)` when a handler answered
    /// [`Flow::SuppressEventHandling`](crate::Flow::SuppressEventHandling)
    /// and nothing was sent.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: impl Into<String>,
    ) -> ClientResult<bool> {
        let outgoing = OutgoingMessage::new(conversation_id, text);
        let seq = self.inner.outgoing_seq.fetch_add(1, Ordering::Relaxed);
        let event = ConversationEvent::new(
            format!("outgoing-{seq}"),
            conversation_id,
            self.self_id(),
            0,
            EventKind::Sending(outgoing.clone()),
        );

        let report = self.handle_event(event).await;
        if report.halted {
            debug!(conversation = %conversation_id, "Outgoing message suppressed");
            return Ok(false);
        }

        self.inner
            .client
            .send_message(conversation_id, &outgoing.text())
            .await?;
        Ok(true)
    }

    /// Uploads an image to a conversation.
    pub async fn send_image(
        &self,
        conversation_id: &str,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> ClientResult<()> {
        self.inner
            .client
            .send_image(conversation_id, image, caption)
            .await
    }

    // ─── Settings ────────────────────────────────────────────────────────────

    /// Looks up `key` for a conversation.
    ///
    /// `conversations.<conversation_id>.<key>` in the config document wins
    /// over the top-level `key`.
    pub fn get_by_conversation(&self, conversation_id: &str, key: &str) -> Option<Value> {
        self.config()
            .get_path(&[CONVERSATIONS_KEY, conversation_id, key])
            .or_else(|| self.config().get_value(key))
    }

    /// Admin user ids for a conversation.
    pub fn admins(&self, conversation_id: &str) -> Vec<String> {
        self.get_by_conversation(conversation_id, ADMINS_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Returns `true` if `user_id` may run admin commands in the conversation.
    pub fn is_admin(&self, conversation_id: &str, user_id: &str) -> bool {
        self.admins(conversation_id).iter().any(|id| id == user_id)
    }

    /// Current command aliases: memory first, then config, then
    /// [`DEFAULT_COMMAND_ALIASES`].
    pub fn command_aliases(&self) -> Vec<String> {
        self.memory()
            .get::<Vec<String>>(COMMAND_ALIASES_KEY)
            .or_else(|| self.config().get::<Vec<String>>(COMMAND_ALIASES_KEY))
            .filter(|aliases| !aliases.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_COMMAND_ALIASES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
    }

    /// Replaces the command aliases and persists them to the memory document.
    pub fn set_command_aliases(&self, aliases: Vec<String>) -> StoreResult<()> {
        self.memory().set(COMMAND_ALIASES_KEY, aliases)?;
        self.memory().save()?;
        Ok(())
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("self_id", &self.self_id())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// HandlerContext
// =============================================================================

/// Everything an event handler receives.
#[derive(Clone)]
pub struct HandlerContext {
    bot: Bot,
    event: Arc<ConversationEvent>,
    category: EventCategory,
    command: Option<Arc<ParsedCommand>>,
}

impl HandlerContext {
    pub(crate) fn new(
        bot: Bot,
        event: Arc<ConversationEvent>,
        category: EventCategory,
        command: Option<Arc<ParsedCommand>>,
    ) -> Self {
        Self {
            bot,
            event,
            category,
            command,
        }
    }

    /// The bot context.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The event being dispatched.
    pub fn event(&self) -> &ConversationEvent {
        &self.event
    }

    /// The shared event snapshot; every handler of one pass gets the same `Arc`.
    pub fn event_arc(&self) -> &Arc<ConversationEvent> {
        &self.event
    }

    /// The category under which this handler was registered.
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// The parsed bot command, when the message started with an alias.
    pub fn command(&self) -> Option<&ParsedCommand> {
        self.command.as_deref()
    }

    /// Sends `text` to the event's conversation.
    pub async fn reply(&self, text: impl Into<String>) -> ClientResult<bool> {
        self.bot
            .send_message(&self.event.conversation_id, text)
            .await
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("event", &self.event.id)
            .field("category", &self.category)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CommandContext
// =============================================================================

/// Everything a command callback receives.
#[derive(Clone)]
pub struct CommandContext {
    bot: Bot,
    event: Arc<ConversationEvent>,
    args: Vec<String>,
}

impl CommandContext {
    pub(crate) fn new(bot: Bot, event: Arc<ConversationEvent>, args: Vec<String>) -> Self {
        Self { bot, event, args }
    }

    /// The bot context.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The message that invoked the command.
    pub fn event(&self) -> &ConversationEvent {
        &self.event
    }

    /// Tokens after the command name.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Whether the sender is an admin in this conversation.
    pub fn sender_is_admin(&self) -> bool {
        self.bot
            .is_admin(&self.event.conversation_id, &self.event.user_id)
    }

    /// Sends `text` to the invoking conversation.
    pub async fn reply(&self, text: impl Into<String>) -> ClientResult<bool> {
        self.bot
            .send_message(&self.event.conversation_id, text)
            .await
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("event", &self.event.id)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
