//! Process settings for the hangbot runtime.
//!
//! Settings are layered with figment (defaults, `hangbot.toml` /
//! `hangbot.yaml`, `HANGBOT_*` environment variables, programmatic
//! overrides) and then validated.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_settings, load_settings_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, Settings, SpanEventConfig,
};
pub use validation::validate_settings;
