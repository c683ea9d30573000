use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use quarry::{
    Config, ConnectorRegistry, Quarry, QuarryCompiler, ScriptCompiler, ScriptRepository,
};
use quarry_connector::CancellationToken;
use tempfile::TempDir;

fn repository(dir: &Path) -> ScriptRepository {
    ScriptRepository::new(
        dir,
        Arc::new(QuarryCompiler::new()),
        Arc::new(ConnectorRegistry::new()),
    )
}

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.scripts.directory = dir.to_path_buf();
    config
}

const ECHO: &str = r#"
use host;

connector Echo {
    id = "echo";
    name = "Echo";
    prefix = "";

    fn initialize(config) {
        self.prefix = host.config_string("prefix", "> ");
        return true;
    }

    fn search(query, max_results) {
        let results = [];
        for i in range(max_results) {
            results = push(results, {id: to_string(i), title: self.prefix + query});
        }
        return results;
    }
}
"#;

#[tokio::test]
async fn test_created_scripts_have_unique_ids() {
    let temp_dir = TempDir::new().unwrap();
    let repo = repository(temp_dir.path());

    let ids: HashSet<String> = (0..50)
        .map(|_| repo.create("Same", "").id().to_string())
        .collect();
    assert_eq!(ids.len(), 50);
}

#[test]
fn test_validate_empty_source_has_no_errors() {
    assert!(QuarryCompiler::new().validate("").is_empty());
}

#[test]
fn test_broken_source_reports_positions() {
    let errors = QuarryCompiler::new().validate("connector A {\n  fn search( {\n}");
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e.line > 0));
}

#[test]
fn test_template_embeds_name_and_id() {
    let source = QuarryCompiler::new().template("Acme", "abc-123");
    assert!(source.contains("AcmeConnector"));
    assert!(source.contains("\"abc-123\""));
}

#[tokio::test]
async fn test_save_then_load_in_fresh_repository() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Persisted", "kept on disk");
    assert!(repo.save(&mut script).await);

    let mut fresh = repository(temp_dir.path());
    assert_eq!(fresh.load_all().await, 1);
    let loaded = fresh.get_by_id(script.id()).unwrap();
    assert_eq!(loaded.source_code, script.source_code);
    assert_eq!(loaded.metadata.description, "kept on disk");
}

#[tokio::test]
async fn test_update_unknown_script_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let script = repo.create("Never saved", "");
    assert!(!repo.update(&script));
    assert!(repo.get_all().is_empty());
}

#[tokio::test]
async fn test_delete_removes_files() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Temporary", "");
    assert!(repo.save(&mut script).await);

    assert!(repo.delete(script.id()));
    let remaining: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_source_without_connector_registers_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Library", "");
    script.set_source("fn shout(text) { return upper(text); }");

    let result = repo.compile_and_register(&mut script).await;
    assert!(result.success);
    assert!(result.connector.is_none());
    assert!(repo.registry().is_empty().await);
}

#[tokio::test]
async fn test_duplicate_connector_id_keeps_latest() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());

    let mut first = repo.create("One", "");
    first.set_source(ECHO);
    let mut second = repo.create("Two", "");
    second.set_source(ECHO.replace("name = \"Echo\"", "name = \"Echo 2\""));

    repo.compile_and_register(&mut first).await;
    repo.compile_and_register(&mut second).await;

    let registry = repo.registry();
    assert_eq!(registry.ids().await, vec!["echo"]);
    assert_eq!(registry.get("echo").await.unwrap().name(), "Echo 2");
}

#[tokio::test]
async fn test_create_save_reload_compile_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let mut app = Quarry::new(config_in(temp_dir.path())).unwrap();
    let mut script = app.repository().create("Starter", "");
    assert!(app.repository_mut().save(&mut script).await);

    let mut reopened = Quarry::new(config_in(temp_dir.path())).unwrap();
    let report = reopened.start().await;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.compiled.unwrap().succeeded, 1);

    let connector = reopened.registry().get(script.id()).await.unwrap();
    assert_eq!(connector.id(), script.id());
    assert_eq!(connector.name(), "Starter");

    let results = reopened
        .search(script.id(), "gam", 5, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "gamma");
    assert_eq!(results[0].connector_id, script.id());
}

#[tokio::test]
async fn test_connector_reads_host_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Echo", "");
    script.set_source(ECHO);

    let connector = repo
        .compile_and_register(&mut script)
        .await
        .connector
        .unwrap();

    let mut config = quarry_connector::ConnectorConfig::new();
    config.insert("prefix".to_string(), serde_json::json!("# "));
    assert!(connector.initialize(config).await.unwrap());

    let results = connector
        .search("hi", 3, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.title == "# hi"));
}

#[tokio::test]
async fn test_cancelled_search_stops() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Echo", "");
    script.set_source(ECHO);
    let connector = repo
        .compile_and_register(&mut script)
        .await
        .connector
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(connector.search("hi", 3, &cancel).await.is_err());
}
