//! Error types for the hangbot framework.

use std::path::PathBuf;

use thiserror::Error;

pub use tower::BoxError;

/// Errors raised by [`JsonStore`](crate::store::JsonStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document root is not a JSON object.
    #[error("document root of {0} is not a JSON object")]
    NotAnObject(PathBuf),

    /// A path write hit a non-object value, or the path was empty.
    #[error("cannot write through '{0}': not a JSON object")]
    PathConflict(String),

    /// A value could not be converted to JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the [`PluginManager`](crate::plugin::PluginManager).
#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin with that name has been registered.
    #[error("plugin '{0}' is not registered")]
    NotFound(String),

    /// The plugin is already active.
    #[error("plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// The plugin's init entry point returned an error.
    #[error("plugin '{plugin}' failed to initialise: {reason}")]
    InitFailed { plugin: String, reason: String },
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
