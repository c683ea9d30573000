//! Connector capability contract
//!
//! Every data source Quarry can search, whether built in or authored as a
//! script at runtime, implements [`Connector`]. Optional members have no-op
//! defaults so a minimal connector only supplies its identity and `search`.

use anyhow::Result;
use async_trait::async_trait;

pub mod base;
pub mod cancel;
pub mod types;

pub use base::*;
pub use cancel::*;
pub use types::*;

/// Connector identifier as reported by the connector itself
pub type ConnectorId = String;

/// Capability contract implemented by every connector
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable capability id, used as the registry key
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Human readable description
    fn description(&self) -> &str;

    /// Connector version
    fn version(&self) -> &str;

    /// Optional icon hint for the host UI
    fn icon(&self) -> Option<&str> {
        None
    }

    /// Configuration parameters the host should ask the user for
    fn configuration_parameters(&self) -> Vec<ConfigurationParameter> {
        Vec::new()
    }

    /// Initialize the connector with user supplied configuration
    async fn initialize(&self, config: ConnectorConfig) -> Result<bool>;

    /// Search the data source, returning at most `max_results` results
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>>;

    /// Check that the data source is reachable with the current configuration
    async fn test_connection(&self) -> Result<bool> {
        Ok(true)
    }

    /// Layout hints for the host's default detail view
    fn detail_view_configuration(&self) -> Option<DetailViewConfiguration> {
        None
    }

    /// Build a custom detail view for a result
    fn create_custom_detail_view(&self, _result: &SearchResult) -> Option<UiElement> {
        None
    }

    /// Execute an action attached to a result
    async fn execute_action(&self, _action: &ResultAction, _result: &SearchResult) -> Result<bool> {
        Ok(false)
    }

    /// Release resources held by the connector
    async fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoConnector {
        base: ConnectorBase,
    }

    #[async_trait]
    impl Connector for EchoConnector {
        fn id(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Returns the query"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn initialize(&self, config: ConnectorConfig) -> Result<bool> {
            self.base.capture(config);
            Ok(true)
        }

        async fn search(
            &self,
            query: &str,
            max_results: usize,
            _cancel: &CancellationToken,
        ) -> Result<Vec<SearchResult>> {
            let repeat = self.base.get_int("repeat", 1).max(0) as usize;
            Ok((0..repeat)
                .map(|i| SearchResult::new(format!("echo-{}", i), query))
                .take(max_results)
                .collect())
        }
    }

    #[tokio::test]
    async fn test_minimal_connector_uses_defaults() {
        let connector = EchoConnector {
            base: ConnectorBase::new("echo"),
        };

        assert!(connector.icon().is_none());
        assert!(connector.configuration_parameters().is_empty());
        assert!(connector.detail_view_configuration().is_none());
        assert!(connector.test_connection().await.unwrap());

        let result = SearchResult::new("x", "x");
        let action = ResultAction::new("open", "Open");
        assert!(!connector.execute_action(&action, &result).await.unwrap());
        assert!(connector.create_custom_detail_view(&result).is_none());
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let connector = EchoConnector {
            base: ConnectorBase::new("echo"),
        };
        let mut config = ConnectorConfig::new();
        config.insert("repeat".to_string(), serde_json::json!(5));
        assert!(connector.initialize(config).await.unwrap());

        let results = connector
            .search("hello", 3, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "hello");
    }
}
