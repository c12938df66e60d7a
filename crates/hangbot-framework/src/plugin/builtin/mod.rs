//! Built-in plugins shipped with the framework.
//!
//! Enabled by the `builtin-plugins` feature (on by default). Each one adds
//! itself to [`BUILTIN_PLUGINS`](super::BUILTIN_PLUGINS), so every bot
//! registers them automatically; whether they are loaded still follows the
//! config key `plugins`.
//!
//! | Plugin | Commands |
//! |--------|----------|
//! | [`CORE_PLUGIN`] | `help`, `ping`, `echo`, `botalias` (admin) |
//! | [`PLUGINS_PLUGIN`] | `plugins`, `unload` (admin), `reload` (admin) |

pub mod core;
pub mod plugins;

pub use self::core::CORE_PLUGIN;
pub use self::plugins::PLUGINS_PLUGIN;
