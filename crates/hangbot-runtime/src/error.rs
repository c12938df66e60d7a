//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use hangbot_framework::StoreError;

/// Errors that can occur while building or running the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The config or memory document could not be loaded or saved.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
