use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{WebhookError, WebhookResult};
use hangbot_framework::Bot;

/// Config key holding the list of listener specs.
pub const WEBHOOKS_KEY: &str = "webhooks";

/// One webhook listener, as written in the config document:
///
/// ```json
/// { "webhooks": [ { "name": "ci", "host": "127.0.0.1", "port": 9100 } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookListenerConfig {
    /// Label used in logs. Defaults to `host:port`.
    #[serde(default)]
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl WebhookListenerConfig {
    /// Creates a listener spec.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The name, or the address when no name was given.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.addr()
        } else {
            self.name.clone()
        }
    }

    /// Parses and checks one spec.
    pub fn from_value(value: Value) -> WebhookResult<Self> {
        let spec: Self = serde_json::from_value(value)
            .map_err(|e| WebhookError::InvalidSpec(e.to_string()))?;
        if spec.host.trim().is_empty() {
            return Err(WebhookError::InvalidSpec("empty host".to_string()));
        }
        Ok(spec)
    }
}

/// Reads the listener specs from the config document.
///
/// Malformed entries are logged and skipped.
pub fn listener_configs(bot: &Bot) -> Vec<WebhookListenerConfig> {
    let Some(value) = bot.config().get_value(WEBHOOKS_KEY) else {
        return Vec::new();
    };
    let Value::Array(items) = value else {
        warn!(key = WEBHOOKS_KEY, "Webhook config is not a list, ignoring");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match WebhookListenerConfig::from_value(item) {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed webhook listener");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let spec =
            WebhookListenerConfig::from_value(json!({ "host": "0.0.0.0", "port": 9000 })).unwrap();
        assert_eq!(spec.label(), "0.0.0.0:9000");

        assert!(WebhookListenerConfig::from_value(json!({ "host": "x" })).is_err());
        assert!(WebhookListenerConfig::from_value(json!({ "host": " ", "port": 1 })).is_err());
        assert!(WebhookListenerConfig::from_value(json!({ "host": "x", "port": 70000 })).is_err());
    }
}
