//! Settings validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, Settings};

/// Validates the merged settings.
pub fn validate_settings(settings: &Settings) -> ConfigResult<()> {
    if settings.config_path.as_os_str().is_empty() {
        return Err(ConfigError::validation("config_path must not be empty"));
    }
    if settings.memory_path.as_os_str().is_empty() {
        return Err(ConfigError::validation("memory_path must not be empty"));
    }
    if settings.config_path == settings.memory_path {
        return Err(ConfigError::validation(format!(
            "config_path and memory_path both point to {}",
            settings.config_path.display()
        )));
    }
    if settings.logging.output == LogOutput::File && settings.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }
    Ok(())
}
