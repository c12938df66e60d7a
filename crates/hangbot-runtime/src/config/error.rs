//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during settings loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Settings file not found: {0}")]
    FileNotFound(PathBuf),

    /// The sources could not be merged into [`Settings`](super::Settings).
    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    /// Invalid settings value.
    #[error("Invalid settings: {message}")]
    ValidationError { message: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
