//! Plugin lifecycle management.
//!
//! The state machine is:
//!
//! ```text
//! register() ──► Registered
//!     load() ──► Active     (init succeeded)
//!            ──► Failed     (init returned an error or panicked)
//!   unload() ──► Registered (handlers and commands removed)
//! ```
//!
//! A failed init never takes the bot down: whatever the plugin registered
//! before failing is removed again and the error is logged.

use std::panic::AssertUnwindSafe;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::{PLUGINS_KEY, PluginDescriptor, PluginScope};
use crate::context::Bot;
use crate::dispatcher::panic_message;
use crate::error::{PluginError, PluginResult};

/// Load state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Known but not loaded.
    Registered,
    /// Loaded; its handlers and commands are live.
    Active,
    /// The last load attempt failed.
    Failed,
}

impl PluginState {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct PluginEntry {
    desc: PluginDescriptor,
    state: PluginState,
}

/// Owner of every registered plugin descriptor and its load state.
#[derive(Default)]
pub struct PluginManager {
    entries: RwLock<Vec<PluginEntry>>,
}

impl PluginManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// A second descriptor with the same name replaces the first; an active
    /// plugin keeps running until it is reloaded.
    pub fn register(&self, desc: PluginDescriptor) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.desc.name == desc.name) {
            warn!(plugin = desc.name, "Plugin registered twice, replacing descriptor");
            entry.desc = desc;
            return;
        }
        entries.push(PluginEntry {
            desc,
            state: PluginState::Registered,
        });
        info!(plugin = desc.name, "Plugin registered");
    }

    /// Registers every descriptor in [`BUILTIN_PLUGINS`](super::BUILTIN_PLUGINS),
    /// in name order.
    pub fn register_builtins(&self) {
        let mut builtins: Vec<PluginDescriptor> = super::BUILTIN_PLUGINS.iter().copied().collect();
        builtins.sort_by_key(|d| d.name);
        for desc in builtins {
            self.register(desc);
        }
    }

    /// Loads one plugin by name.
    pub fn load(&self, bot: &Bot, name: &str) -> PluginResult<()> {
        let desc = {
            let entries = self.entries.read();
            let entry = entries
                .iter()
                .find(|e| e.desc.name == name)
                .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
            if entry.state == PluginState::Active {
                return Err(PluginError::AlreadyLoaded(name.to_string()));
            }
            entry.desc
        };

        let scope = PluginScope::new(bot, desc.name);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| (desc.init)(&scope)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        match failure {
            None => {
                self.set_state(desc.name, PluginState::Active);
                info!(plugin = desc.name, "Plugin loaded");
                Ok(())
            }
            Some(reason) => {
                bot.registry().unload(desc.name);
                self.set_state(desc.name, PluginState::Failed);
                error!(plugin = desc.name, error = %reason, "Plugin failed to load");
                Err(PluginError::InitFailed {
                    plugin: desc.name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Loads every registered plugin, or only those listed under the config
    /// key `plugins` when it is set.
    ///
    /// Failures are logged and skipped. Returns how many plugins are active
    /// afterwards.
    pub fn load_all(&self, bot: &Bot) -> usize {
        let registered: Vec<&'static str> =
            self.entries.read().iter().map(|e| e.desc.name).collect();

        let selected: Vec<String> = match bot.config().get::<Vec<String>>(PLUGINS_KEY) {
            Some(wanted) => {
                for name in wanted.iter().filter(|w| !registered.iter().any(|r| *r == w.as_str())) {
                    warn!(plugin = %name, "Configured plugin is not registered");
                }
                registered
                    .iter()
                    .filter(|name| wanted.iter().any(|w| w.as_str() == **name))
                    .map(|name| name.to_string())
                    .collect()
            }
            None => registered.iter().map(|name| name.to_string()).collect(),
        };

        for name in &selected {
            // Init failures are logged by `load`.
            if let Err(PluginError::AlreadyLoaded(name)) = self.load(bot, name) {
                debug!(plugin = %name, "Plugin already active");
            }
        }

        let active = self.loaded().len();
        info!(active, registered = registered.len(), "Plugins loaded");
        active
    }

    /// Removes a plugin's handlers and commands.
    ///
    /// Returns the number of registry entries removed.
    pub fn unload(&self, bot: &Bot, name: &str) -> PluginResult<usize> {
        if self.state(name).is_none() {
            return Err(PluginError::NotFound(name.to_string()));
        }
        let removed = bot.registry().unload(name);
        self.set_state(name, PluginState::Registered);
        info!(plugin = name, removed, "Plugin unloaded");
        Ok(removed)
    }

    /// Unloads and loads a plugin again.
    pub fn reload(&self, bot: &Bot, name: &str) -> PluginResult<()> {
        self.unload(bot, name)?;
        self.load(bot, name)
    }

    /// State of a plugin, `None` if it is not registered.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.entries
            .read()
            .iter()
            .find(|e| e.desc.name == name)
            .map(|e| e.state)
    }

    /// Names of the active plugins, in registration order.
    pub fn loaded(&self) -> Vec<&'static str> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.state == PluginState::Active)
            .map(|e| e.desc.name)
            .collect()
    }

    /// Every registered descriptor with its state, in registration order.
    pub fn descriptors(&self) -> Vec<(PluginDescriptor, PluginState)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.desc, e.state))
            .collect()
    }

    fn set_state(&self, name: &str, state: PluginState) {
        if let Some(entry) = self.entries.write().iter_mut().find(|e| e.desc.name == name) {
            entry.state = state;
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_map()
            .entries(entries.iter().map(|e| (e.desc.name, e.state)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContext;
    use crate::error::BoxError;
    use crate::registry::CommandScope;
    use crate::test_support::test_bot;
    use serde_json::json;

    async fn noop(_ctx: CommandContext) -> Result<(), BoxError> {
        Ok(())
    }

    static GOOD: PluginDescriptor = PluginDescriptor {
        name: "good",
        desc: "registers one command",
        init: |scope| {
            scope.register_user_command(["good"], noop);
            Ok(())
        },
    };

    static BAD: PluginDescriptor = PluginDescriptor {
        name: "bad",
        desc: "fails halfway through init",
        init: |scope| {
            scope.register_user_command(["half"], noop);
            Err("missing api key".into())
        },
    };

    static PANICKY: PluginDescriptor = PluginDescriptor {
        name: "panicky",
        desc: "panics in init",
        init: |_scope| panic!("init exploded"),
    };

    #[test]
    fn test_load_and_unload() {
        let (bot, _) = test_bot(json!({}));
        let manager = PluginManager::new();
        manager.register(GOOD);

        assert_eq!(manager.state("good"), Some(PluginState::Registered));
        manager.load(&bot, "good").unwrap();
        assert_eq!(manager.state("good"), Some(PluginState::Active));
        assert!(bot.registry().command(CommandScope::User, "good").is_some());
        assert!(matches!(
            manager.load(&bot, "good"),
            Err(PluginError::AlreadyLoaded(_))
        ));

        assert_eq!(manager.unload(&bot, "good").unwrap(), 1);
        assert_eq!(manager.state("good"), Some(PluginState::Registered));
        assert!(bot.registry().command(CommandScope::User, "good").is_none());

        manager.reload(&bot, "good").unwrap();
        assert_eq!(manager.loaded(), vec!["good"]);
    }

    #[test]
    fn test_failed_init_is_rolled_back() {
        let (bot, _) = test_bot(json!({}));
        let manager = PluginManager::new();
        manager.register(BAD);
        manager.register(PANICKY);

        assert!(matches!(
            manager.load(&bot, "bad"),
            Err(PluginError::InitFailed { .. })
        ));
        assert!(matches!(
            manager.load(&bot, "panicky"),
            Err(PluginError::InitFailed { .. })
        ));
        assert_eq!(manager.state("bad"), Some(PluginState::Failed));
        assert_eq!(manager.state("panicky"), Some(PluginState::Failed));
        assert!(bot.registry().command(CommandScope::User, "half").is_none());
    }

    #[test]
    fn test_load_all_honours_plugin_list() {
        let (bot, _) = test_bot(json!({ "plugins": ["good", "ghost"] }));
        let manager = PluginManager::new();
        manager.register(GOOD);
        manager.register(BAD);

        assert_eq!(manager.load_all(&bot), 1);
        assert_eq!(manager.state("bad"), Some(PluginState::Registered));
    }

    #[test]
    fn test_load_all_without_list_loads_everything() {
        let (bot, _) = test_bot(json!({}));
        let manager = PluginManager::new();
        manager.register(GOOD);
        manager.register(BAD);

        assert_eq!(manager.load_all(&bot), 1);
        assert_eq!(manager.state("bad"), Some(PluginState::Failed));
    }

    #[test]
    fn test_unknown_plugin() {
        let (bot, _) = test_bot(json!({}));
        let manager = PluginManager::new();
        assert!(matches!(
            manager.load(&bot, "nope"),
            Err(PluginError::NotFound(_))
        ));
        assert!(matches!(
            manager.unload(&bot, "nope"),
            Err(PluginError::NotFound(_))
        ));
    }
}
