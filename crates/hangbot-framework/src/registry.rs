//! Handler and command registry.
//!
//! The [`Registry`] is the bookkeeping half of the dispatch system. It holds:
//!
//! - per [`EventCategory`], a list of [`HandlerEntry`] values ordered by
//!   `(priority, registration sequence)`;
//! - two name-keyed command tables, one per [`CommandScope`].
//!
//! Every entry remembers the plugin that registered it so a plugin can be
//! unloaded (and reloaded) without touching anyone else's entries.
//!
//! Callbacks are stored as boxed tower services, so plain async closures and
//! hand-built `tower` stacks register the same way:
//!
//! ```rust,ignore
//! registry.register_handler("logger", EventCategory::Message, 10, |ctx: HandlerContext| async move {
//!     info!(text = ?ctx.event().text(), "message seen");
//!     Ok(Flow::Continue)
//! });
//!
//! registry.register_command("core", CommandScope::User, ["ping"], |ctx: CommandContext| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tower::service_fn;
use tower::util::BoxCloneSyncService;
use tracing::{debug, info, warn};

use crate::context::{CommandContext, HandlerContext};
use crate::error::BoxError;
use hangbot_core::EventCategory;

/// Priority used when a plugin does not pick one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// What a handler asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Nothing more to do for this handler; same as [`Flow::Continue`].
    SuppressHandler,
    /// Skip every remaining handler with a higher priority value.
    /// Handlers at the same priority still run.
    SuppressAllHandlers,
    /// Stop processing this event entirely, including any pending send.
    SuppressEventHandling,
}

/// Boxed handler callback.
pub type HandlerService = BoxCloneSyncService<HandlerContext, Flow, BoxError>;

/// Boxed command callback.
pub type CommandService = BoxCloneSyncService<CommandContext, (), BoxError>;

// =============================================================================
// Entries
// =============================================================================

/// One registered event handler.
#[derive(Clone)]
pub struct HandlerEntry {
    category: EventCategory,
    priority: i32,
    plugin: Arc<str>,
    seq: u64,
    service: HandlerService,
}

impl HandlerEntry {
    /// The category this handler subscribed to.
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Lower runs first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Name of the plugin that registered this handler.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Global registration order, used to break priority ties.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn service(&self) -> HandlerService {
        self.service.clone()
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("plugin", &self.plugin)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Which command table a command lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    /// Only visible to admins of the conversation.
    Admin,
    /// Visible to everyone.
    User,
}

impl CommandScope {
    fn other(self) -> Self {
        match self {
            Self::Admin => Self::User,
            Self::User => Self::Admin,
        }
    }
}

/// One registered command.
#[derive(Clone)]
pub struct CommandEntry {
    name: String,
    scope: CommandScope,
    plugin: Arc<str>,
    service: CommandService,
}

impl CommandEntry {
    /// Lowercase command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table this command lives in.
    pub fn scope(&self) -> CommandScope {
        self.scope
    }

    /// Name of the plugin that registered this command.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub(crate) fn service(&self) -> CommandService {
        self.service.clone()
    }
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
struct RegistryState {
    handlers: HashMap<EventCategory, Vec<HandlerEntry>>,
    admin_commands: HashMap<String, CommandEntry>,
    user_commands: HashMap<String, CommandEntry>,
    next_seq: u64,
}

impl RegistryState {
    fn table_mut(&mut self, scope: CommandScope) -> &mut HashMap<String, CommandEntry> {
        match scope {
            CommandScope::Admin => &mut self.admin_commands,
            CommandScope::User => &mut self.user_commands,
        }
    }

    fn table(&self, scope: CommandScope) -> &HashMap<String, CommandEntry> {
        match scope {
            CommandScope::Admin => &self.admin_commands,
            CommandScope::User => &self.user_commands,
        }
    }
}

/// The bot-wide handler and command registry.
///
/// Mutation is expected during plugin load and administrative reloads.
/// Readers take short snapshots, so no lock is ever held while a handler
/// runs.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Handlers ────────────────────────────────────────────────────────────

    /// Registers an async closure as a handler.
    ///
    /// Never fails. Registering the same callback twice yields two entries.
    pub fn register_handler<F, Fut>(
        &self,
        plugin: &str,
        category: EventCategory,
        priority: i32,
        f: F,
    ) where
        F: Fn(HandlerContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        self.register_service(
            plugin,
            category,
            priority,
            BoxCloneSyncService::new(service_fn(f)),
        );
    }

    /// Registers a pre-built handler service.
    pub fn register_service(
        &self,
        plugin: &str,
        category: EventCategory,
        priority: i32,
        service: HandlerService,
    ) {
        let mut state = self.state.write();
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .handlers
            .entry(category)
            .or_default()
            .push(HandlerEntry {
                category,
                priority,
                plugin: Arc::from(plugin),
                seq,
                service,
            });
        debug!(plugin, %category, priority, seq, "Handler registered");
    }

    /// Returns every handler subscribed to any of `categories`, sorted by
    /// priority and then by registration order.
    pub fn handlers_for(&self, categories: &[EventCategory]) -> Vec<HandlerEntry> {
        let state = self.state.read();
        let mut entries: Vec<HandlerEntry> = categories
            .iter()
            .filter_map(|c| state.handlers.get(c))
            .flatten()
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.priority, e.seq));
        entries
    }

    /// Total number of handler entries across all categories.
    pub fn handler_count(&self) -> usize {
        self.state.read().handlers.values().map(Vec::len).sum()
    }

    // ─── Commands ────────────────────────────────────────────────────────────

    /// Registers an async closure under one or more command names.
    ///
    /// Names are lowercased. A name lives in exactly one table: registering
    /// it again, in either scope, replaces the previous entry.
    pub fn register_command<I, S, F, Fut>(&self, plugin: &str, scope: CommandScope, names: I, f: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(CommandContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let service: CommandService = BoxCloneSyncService::new(service_fn(f));
        let plugin: Arc<str> = Arc::from(plugin);
        let mut state = self.state.write();

        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                warn!(plugin = %plugin, "Ignoring empty command name");
                continue;
            }
            if let Some(prev) = state.table_mut(scope.other()).remove(&name) {
                debug!(command = %name, prev_plugin = %prev.plugin, "Command moved between scopes");
            }
            let entry = CommandEntry {
                name: name.clone(),
                scope,
                plugin: Arc::clone(&plugin),
                service: service.clone(),
            };
            if let Some(prev) = state.table_mut(scope).insert(name.clone(), entry) {
                debug!(
                    command    = %name,
                    prev_plugin = %prev.plugin,
                    new_plugin  = %plugin,
                    "Command overwritten, last registration wins"
                );
            }
        }
    }

    /// Looks up a command in one table.
    pub fn command(&self, scope: CommandScope, name: &str) -> Option<CommandEntry> {
        self.state.read().table(scope).get(&name.to_lowercase()).cloned()
    }

    /// Sorted command names of one table.
    pub fn command_names(&self, scope: CommandScope) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().table(scope).keys().cloned().collect();
        names.sort();
        names
    }

    // ─── Unloading ───────────────────────────────────────────────────────────

    /// Removes every handler and command registered by `plugin`.
    ///
    /// Returns how many entries were removed; zero is not an error.
    pub fn unload(&self, plugin: &str) -> usize {
        let mut state = self.state.write();
        let mut removed = 0;

        for entries in state.handlers.values_mut() {
            let before = entries.len();
            entries.retain(|e| &*e.plugin != plugin);
            removed += before - entries.len();
        }
        state.handlers.retain(|_, entries| !entries.is_empty());

        for scope in [CommandScope::Admin, CommandScope::User] {
            let table = state.table_mut(scope);
            let before = table.len();
            table.retain(|_, e| &*e.plugin != plugin);
            removed += before - table.len();
        }

        if removed > 0 {
            info!(plugin, removed, "Unloaded plugin entries");
        }
        removed
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("handlers", &state.handlers.values().map(Vec::len).sum::<usize>())
            .field("admin_commands", &state.admin_commands.len())
            .field("user_commands", &state.user_commands.len())
            .finish()
    }
}
