//! Shared connector plumbing: captured configuration and logging helpers

use std::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::ConnectorConfig;

/// State and helpers every connector implementation can embed
#[derive(Debug, Default)]
pub struct ConnectorBase {
    connector_id: String,
    config: RwLock<ConnectorConfig>,
}

impl ConnectorBase {
    /// Create a base for the connector with the given id
    pub fn new(connector_id: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            config: RwLock::new(ConnectorConfig::new()),
        }
    }

    /// Id used to tag log output
    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    /// Replace the captured configuration
    pub fn capture(&self, config: ConnectorConfig) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }

    /// Snapshot of the captured configuration
    pub fn config(&self) -> ConnectorConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Raw configuration value
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// String value, or `default` when missing or null
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.get_value(key) {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Integer value, accepting numbers and numeric strings
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get_value(key) {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Boolean value, accepting booleans, "true"/"false" and 0/1
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_value(key) {
            Some(serde_json::Value::Bool(b)) => b,
            Some(serde_json::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => default,
            },
            Some(serde_json::Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(default),
            _ => default,
        }
    }

    pub fn log_debug(&self, message: &str) {
        debug!(connector = %self.connector_id, "{}", message);
    }

    pub fn log_info(&self, message: &str) {
        info!(connector = %self.connector_id, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(connector = %self.connector_id, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(connector = %self.connector_id, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_with(values: &[(&str, serde_json::Value)]) -> ConnectorBase {
        let base = ConnectorBase::new("test");
        base.capture(
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        base
    }

    #[test]
    fn test_typed_lookups() {
        let base = base_with(&[
            ("url", json!("https://example.com")),
            ("limit", json!("25")),
            ("verbose", json!("yes")),
            ("count", json!(7)),
        ]);

        assert_eq!(base.get_string("url", ""), "https://example.com");
        assert_eq!(base.get_string("missing", "fallback"), "fallback");
        assert_eq!(base.get_string("count", ""), "7");
        assert_eq!(base.get_int("limit", 10), 25);
        assert_eq!(base.get_int("count", 0), 7);
        assert_eq!(base.get_int("url", 3), 3);
        assert!(base.get_bool("verbose", false));
        assert!(base.get_bool("missing", true));
    }

    #[test]
    fn test_capture_replaces_previous_config() {
        let base = base_with(&[("a", json!(1))]);
        base.capture(ConnectorConfig::new());
        assert!(base.get_value("a").is_none());
        assert!(base.config().is_empty());
    }
}
