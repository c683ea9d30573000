//! Quarry Library
//!
//! Runtime compilation of user-authored search connectors. Connector scripts
//! are stored in a directory, compiled against a fixed reference surface,
//! instantiated and registered into a live [`ConnectorRegistry`] without
//! restarting the host.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod model;
pub mod registry;
pub mod repository;
pub mod utils;

pub use compiler::{
    CompilationError, CompilationResult, CompletionItem, CompletionKind, QuarryCompiler,
    ScriptCompiler, ScriptedConnector,
};
pub use config::{CompilerConfig, Config, ScriptsConfig};
pub use model::{ConnectorScript, ScriptMetadata};
pub use registry::ConnectorRegistry;
pub use repository::{CompileSummary, RepositoryError, ScriptRepository};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use quarry_connector::{CancellationToken, Connector, ConnectorConfig, SearchResult};

/// Main application context that coordinates all components
pub struct Quarry {
    config: Config,
    compiler: Arc<QuarryCompiler>,
    repository: ScriptRepository,
}

/// What happened while opening the script directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Scripts read from disk
    pub loaded: usize,

    /// Compilation outcome, when scripts were compiled on startup
    pub compiled: Option<CompileSummary>,
}

impl Quarry {
    /// Create a new Quarry instance with the given configuration
    pub fn new(config: Config) -> QuarryResult<Self> {
        config
            .validate()
            .map_err(|e| QuarryError::Config(e.to_string()))?;
        let directory = config
            .scripts
            .resolved_directory()
            .map_err(|e| QuarryError::Config(e.to_string()))?;

        let compiler = Arc::new(QuarryCompiler::from_config(&config.compiler));
        let registry = Arc::new(ConnectorRegistry::new());
        let repository = ScriptRepository::new(directory, compiler.clone(), registry)
            .with_extension(config.scripts.extension.clone());

        Ok(Self {
            config,
            compiler,
            repository,
        })
    }

    /// Load stored scripts and, if configured, compile them
    pub async fn start(&mut self) -> StartupReport {
        let loaded = self.repository.load_all().await;
        let compiled = if self.config.scripts.compile_on_startup {
            Some(self.repository.compile_all().await)
        } else {
            None
        };
        info!(
            "Quarry started with {} script(s) and {} connector(s)",
            loaded,
            self.registry().len().await
        );
        StartupReport { loaded, compiled }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compiler(&self) -> &Arc<QuarryCompiler> {
        &self.compiler
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        self.repository.registry()
    }

    pub fn repository(&self) -> &ScriptRepository {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut ScriptRepository {
        &mut self.repository
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.repository.directory().to_path_buf()
    }

    /// Full id of the script matching an id or unambiguous id prefix
    pub fn resolve(&self, id_or_prefix: &str) -> QuarryResult<String> {
        self.repository
            .resolve_id(id_or_prefix)
            .map(str::to_string)
            .ok_or_else(|| QuarryError::ScriptNotFound(id_or_prefix.to_string()))
    }

    /// Compile one script and register its connector
    pub async fn compile(&mut self, id_or_prefix: &str) -> QuarryResult<CompilationResult> {
        let id = self.resolve(id_or_prefix)?;
        let mut script = self
            .repository
            .get_by_id(&id)
            .cloned()
            .ok_or_else(|| QuarryError::ScriptNotFound(id.clone()))?;
        Ok(self.repository.compile_and_register(&mut script).await)
    }

    /// Connector for a script, compiling it first if needed
    pub async fn connector(&mut self, id_or_prefix: &str) -> QuarryResult<Arc<dyn Connector>> {
        let id = self.resolve(id_or_prefix)?;
        if let Some(connector) = self.repository.get_instance(&id) {
            return Ok(connector);
        }

        let result = self.compile(&id).await?;
        if let Some(connector) = &result.connector {
            return Ok(Arc::clone(connector));
        }

        let mut problems = result.problem_messages();
        if problems.is_empty() {
            problems.push("no connector was produced".to_string());
        }
        Err(QuarryError::Compilation(problems.join("; ")))
    }

    /// Initialize a script's connector with its parameter defaults and search it
    pub async fn search(
        &mut self,
        id_or_prefix: &str,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> QuarryResult<Vec<SearchResult>> {
        let connector = self.connector(id_or_prefix).await?;

        let config: ConnectorConfig = connector
            .configuration_parameters()
            .into_iter()
            .filter(|p| !p.default_value.is_null())
            .map(|p| (p.key, p.default_value))
            .collect();
        let accepted = connector
            .initialize(config)
            .await
            .map_err(|e| QuarryError::Connector(e.to_string()))?;
        if !accepted {
            return Err(QuarryError::Connector(format!(
                "Connector '{}' rejected its configuration",
                connector.id()
            )));
        }

        connector
            .search(query, max_results, cancel)
            .await
            .map_err(|e| QuarryError::Connector(e.to_string()))
    }
}

/// Error types for the application
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Compilation failed: {0}")]
    Compilation(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Result type for the main application
pub type QuarryResult<T> = Result<T, QuarryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &std::path::Path, compile_on_startup: bool) -> Config {
        let mut config = Config::default();
        config.scripts.directory = dir.to_path_buf();
        config.scripts.compile_on_startup = compile_on_startup;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.version = "0.9".to_string();
        assert!(matches!(Quarry::new(config), Err(QuarryError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_compiles_stored_scripts() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = Quarry::new(config_in(temp_dir.path(), true)).unwrap();
        let mut script = app.repository().create("Starter", "");
        assert!(app.repository_mut().save(&mut script).await);

        let mut reopened = Quarry::new(config_in(temp_dir.path(), true)).unwrap();
        let report = reopened.start().await;
        assert_eq!(report.loaded, 1);
        assert_eq!(report.compiled.unwrap().succeeded, 1);
        assert_eq!(reopened.registry().ids().await, vec![script.id().to_string()]);
    }

    #[tokio::test]
    async fn test_search_uses_parameter_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = Quarry::new(config_in(temp_dir.path(), false)).unwrap();
        let mut script = app.repository().create("Starter", "");
        assert!(app.repository_mut().save(&mut script).await);

        let prefix = &script.id()[..8];
        let results = app
            .search(prefix, "be", 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "beta");
        assert!(app.repository().get_by_id(script.id()).unwrap().is_compiled);
    }

    #[tokio::test]
    async fn test_connector_reports_compile_problems() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = Quarry::new(config_in(temp_dir.path(), false)).unwrap();
        let mut script = app.repository().create("Broken", "");
        script.set_source("connector Broken {\n    id = ;\n}");
        assert!(app.repository_mut().save(&mut script).await);

        match app.connector(script.id()).await {
            Err(QuarryError::Compilation(message)) => assert!(message.contains("2:")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("broken script produced a connector"),
        }

        let mut helpers = app.repository().create("Helpers", "");
        helpers.set_source("fn helper() { return 1; }");
        assert!(app.repository_mut().save(&mut helpers).await);
        let err = app.connector(helpers.id()).await.err().unwrap();
        assert!(err.to_string().contains("no concrete connector"));
    }

    #[tokio::test]
    async fn test_connector_is_cached_after_compile() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = Quarry::new(config_in(temp_dir.path(), false)).unwrap();
        let mut script = app.repository().create("Cached", "");
        assert!(app.repository_mut().save(&mut script).await);

        let first = app.connector(script.id()).await.unwrap();
        let second = app.connector(script.id()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_unknown_script() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = Quarry::new(config_in(temp_dir.path(), false)).unwrap();
        let err = app.compile("missing").await.unwrap_err();
        assert!(matches!(err, QuarryError::ScriptNotFound(_)));
    }
}
