//! Live registry of connectors available to the host

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use quarry_connector::{Connector, ConnectorId};

/// Registered connector
#[derive(Clone)]
pub struct RegistryEntry {
    pub connector: Arc<dyn Connector>,

    /// When the connector was (last) registered
    pub registered_at: DateTime<Utc>,
}

/// Connectors keyed by their self-reported id
///
/// Shared by `Arc`; all access goes through one lock. Entries are never
/// removed, registering an existing id replaces the previous connector.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: RwLock<HashMap<ConnectorId, RegistryEntry>>,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a connector, returning the one it replaced
    pub async fn register(&self, connector: Arc<dyn Connector>) -> Option<Arc<dyn Connector>> {
        let id = connector.id().to_string();
        let name = connector.name().to_string();
        let entry = RegistryEntry {
            connector,
            registered_at: Utc::now(),
        };

        let previous = self.connectors.write().await.insert(id.clone(), entry);
        match &previous {
            Some(old) => warn!(
                "Connector '{}' replaced ({} -> {})",
                id,
                old.connector.name(),
                name
            ),
            None => info!("Registered connector '{}'", id),
        }
        previous.map(|entry| entry.connector)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Connector>> {
        self.connectors
            .read()
            .await
            .get(id)
            .map(|entry| Arc::clone(&entry.connector))
    }

    pub async fn entry(&self, id: &str) -> Option<RegistryEntry> {
        self.connectors.read().await.get(id).cloned()
    }

    /// Registered ids, sorted
    pub async fn ids(&self) -> Vec<ConnectorId> {
        let mut ids: Vec<_> = self.connectors.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All registered connectors, sorted by id
    pub async fn all(&self) -> Vec<Arc<dyn Connector>> {
        let connectors = self.connectors.read().await;
        let mut entries: Vec<_> = connectors.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, entry)| Arc::clone(&entry.connector))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.connectors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connectors.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use quarry_connector::{CancellationToken, ConnectorConfig, SearchResult};

    struct Fixed {
        id: &'static str,
        name: &'static str,
    }

    #[async_trait]
    impl Connector for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            ""
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn initialize(&self, _config: ConnectorConfig) -> Result<bool> {
            Ok(true)
        }

        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
            _cancel: &CancellationToken,
        ) -> Result<Vec<SearchResult>> {
            Ok(Vec::new())
        }
    }

    fn fixed(id: &'static str, name: &'static str) -> Arc<dyn Connector> {
        Arc::new(Fixed { id, name })
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ConnectorRegistry::new();
        assert!(registry.is_empty().await);

        assert!(registry.register(fixed("b", "B")).await.is_none());
        assert!(registry.register(fixed("a", "A")).await.is_none());

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.ids().await, vec!["a", "b"]);
        assert_eq!(registry.get("a").await.unwrap().name(), "A");
        assert!(registry.get("c").await.is_none());
        assert_eq!(registry.all().await[1].id(), "b");
    }

    #[tokio::test]
    async fn test_register_replaces_same_id() {
        let registry = ConnectorRegistry::new();
        registry.register(fixed("a", "First")).await;
        let replaced = registry.register(fixed("a", "Second")).await;

        assert_eq!(replaced.unwrap().name(), "First");
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get("a").await.unwrap().name(), "Second");
        assert!(registry.entry("a").await.is_some());
    }
}
