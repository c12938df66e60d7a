//! Plugin system.
//!
//! A plugin is a static [`PluginDescriptor`]: a name, a one-line description
//! and an `init` function. Loading a plugin calls `init` with a
//! [`PluginScope`], through which it registers handlers and commands. Every
//! registration is tagged with the plugin's name, so unloading removes
//! exactly what the plugin added.
//!
//! ```rust,ignore
//! use hangbot::prelude::*;
//!
//! pub static GREETER: PluginDescriptor = PluginDescriptor {
//!     name: "greeter",
//!     desc: "Welcomes new participants",
//!     init: |scope| {
//!         scope.on(EventCategory::Membership, greet);
//!         scope.register_user_command(["hi"], hi);
//!         Ok(())
//!     },
//! };
//! ```
//!
//! Built-in plugins contribute their descriptor to [`BUILTIN_PLUGINS`] and are
//! registered with every [`PluginManager`] created by the bot.
//!
//! # Configuration
//!
//! A plugin reads its own section of the config document with
//! [`PluginScope::config`], from `plugin_config.<name>`:
//!
//! ```json
//! { "plugin_config": { "greeter": { "message": "Welcome!" } } }
//! ```

use std::future::Future;

use linkme::distributed_slice;
use serde::de::DeserializeOwned;

use crate::context::{Bot, CommandContext, HandlerContext};
use crate::error::BoxError;
use crate::registry::{CommandScope, DEFAULT_PRIORITY, Flow, HandlerService};
use hangbot_core::EventCategory;

mod manager;

#[cfg(feature = "builtin-plugins")]
pub mod builtin;

pub use manager::{PluginManager, PluginState};

/// Config key holding per-plugin sections.
pub const PLUGIN_CONFIG_KEY: &str = "plugin_config";

/// Config key listing the plugins to load. Absent means all.
pub const PLUGINS_KEY: &str = "plugins";

/// Signature of a plugin's init entry point.
pub type PluginInitFn = fn(&PluginScope<'_>) -> Result<(), BoxError>;

/// Static description of a plugin.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Unique plugin name; also the identity used for unloading.
    pub name: &'static str,
    /// One-line description shown by the `plugins` command.
    pub desc: &'static str,
    /// Registers the plugin's handlers and commands.
    pub init: PluginInitFn,
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Descriptors of the plugins shipped with the framework.
#[distributed_slice]
pub static BUILTIN_PLUGINS: [PluginDescriptor];

/// Registration surface handed to a plugin's `init`.
pub struct PluginScope<'a> {
    bot: &'a Bot,
    plugin: &'static str,
}

impl<'a> PluginScope<'a> {
    pub(crate) fn new(bot: &'a Bot, plugin: &'static str) -> Self {
        Self { bot, plugin }
    }

    /// The bot context.
    pub fn bot(&self) -> &Bot {
        self.bot
    }

    /// The plugin being initialised.
    pub fn name(&self) -> &'static str {
        self.plugin
    }

    /// Registers a handler at [`DEFAULT_PRIORITY`].
    pub fn on<F, Fut>(&self, category: EventCategory, f: F)
    where
        F: Fn(HandlerContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        self.register_handler(category, DEFAULT_PRIORITY, f);
    }

    /// Registers a handler. Lower priorities run first.
    pub fn register_handler<F, Fut>(&self, category: EventCategory, priority: i32, f: F)
    where
        F: Fn(HandlerContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        self.bot
            .registry()
            .register_handler(self.plugin, category, priority, f);
    }

    /// Registers a pre-built handler service.
    pub fn register_service(&self, category: EventCategory, priority: i32, service: HandlerService) {
        self.bot
            .registry()
            .register_service(self.plugin, category, priority, service);
    }

    /// Registers a command visible to everyone.
    pub fn register_user_command<I, S, F, Fut>(&self, names: I, f: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(CommandContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.bot
            .registry()
            .register_command(self.plugin, CommandScope::User, names, f);
    }

    /// Registers a command visible to conversation admins only.
    pub fn register_admin_command<I, S, F, Fut>(&self, names: I, f: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(CommandContext) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.bot
            .registry()
            .register_command(self.plugin, CommandScope::Admin, names, f);
    }

    /// The plugin's config section, `plugin_config.<name>`.
    pub fn config<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self
            .bot
            .config()
            .get_path(&[PLUGIN_CONFIG_KEY, self.plugin])?;
        serde_json::from_value(value).ok()
    }
}
