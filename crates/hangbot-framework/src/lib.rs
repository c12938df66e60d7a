//! # Hangbot Framework
//!
//! The handler/command registry and dispatch protocol of the hangbot chat bot.
//!
//! This layer provides:
//! - [`Registry`]: per-category handler lists ordered by priority, plus the
//!   admin and user command tables
//! - [`Dispatcher`]: runs one event through its handlers, honouring [`Flow`]
//!   suppression signals and isolating failures
//! - [`command`]: alias detection, shell-like tokenizing and the built-in
//!   command resolver
//! - [`Bot`]: the shared context handed to every handler and command
//! - [`JsonStore`]: the config and memory documents
//! - [`plugin`]: static plugin descriptors, the plugin manager and the
//!   built-in plugins (with the `builtin-plugins` feature)

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{CommandResolver, ParsedCommand, Resolution, parse_command, shell_split};
pub use context::{Bot, CommandContext, HandlerContext};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{BoxError, PluginError, PluginResult, StoreError, StoreResult};
pub use plugin::{BUILTIN_PLUGINS, PluginDescriptor, PluginManager, PluginScope, PluginState};
pub use registry::{
    CommandEntry, CommandScope, CommandService, DEFAULT_PRIORITY, Flow, HandlerEntry,
    HandlerService, Registry,
};
pub use store::JsonStore;
