use super::*;
use crate::compiler::QuarryCompiler;
use std::fs;
use tempfile::TempDir;

fn repository(dir: &Path) -> ScriptRepository {
    ScriptRepository::new(
        dir,
        Arc::new(QuarryCompiler::new()),
        Arc::new(ConnectorRegistry::new()),
    )
}

fn connector_source(id: &str, name: &str) -> String {
    format!(
        r#"connector Fixed {{
    id = "{}";
    name = "{}";
    fn search(query, max_results) {{ return [{{id: "1", title: query}}]; }}
}}"#,
        id, name
    )
}

#[test]
fn test_create_uses_template_and_fresh_ids() {
    let temp_dir = TempDir::new().unwrap();
    let repo = repository(temp_dir.path());

    let a = repo.create("Wiki", "Team wiki");
    let b = repo.create("Wiki", "Team wiki");
    assert_ne!(a.id(), b.id());
    assert!(a.source_code.contains("WikiConnector"));
    assert!(a.source_code.contains(a.id()));
    assert!(a.file_path.is_none());
    assert!(repo.get_by_id(a.id()).is_none());
}

#[tokio::test]
async fn test_save_writes_source_and_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("My Notes", "");

    assert!(repo.save(&mut script).await);

    let path = script.file_path.clone().unwrap();
    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(file_name, format!("My_Notes_{}.qs", script.metadata.short_id()));
    assert_eq!(fs::read_to_string(&path).unwrap(), script.source_code);

    let meta = fs::read_to_string(path.with_extension("meta")).unwrap();
    assert!(meta.contains("\"isEnabled\": true"));
    assert!(meta.contains(&format!("\"id\": \"{}\"", script.id())));
    assert!(repo.get_by_id(script.id()).is_some());
}

#[tokio::test]
async fn test_rename_removes_old_files() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Old", "");
    assert!(repo.save(&mut script).await);
    let old_path = script.file_path.clone().unwrap();

    script.metadata.name = "New".to_string();
    assert!(repo.save(&mut script).await);

    assert!(!old_path.exists());
    assert!(!old_path.with_extension("meta").exists());
    assert!(script.file_path.unwrap().exists());
}

#[tokio::test]
async fn test_failed_metadata_write_leaves_no_files() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Half", "");
    let modified_at = script.metadata.modified_at;

    let stem = format!("Half_{}", script.metadata.short_id());
    fs::create_dir(temp_dir.path().join(format!("{}.meta.tmp", stem))).unwrap();

    assert!(!repo.save(&mut script).await);
    assert!(!temp_dir.path().join(format!("{}.qs", stem)).exists());
    assert!(!temp_dir.path().join(format!("{}.qs.tmp", stem)).exists());
    assert!(!temp_dir.path().join(format!("{}.meta", stem)).exists());
    assert!(script.file_path.is_none());
    assert_eq!(script.metadata.modified_at, modified_at);
    assert!(repo.get_by_id(script.id()).is_none());

    let mut reloaded = repository(temp_dir.path());
    assert_eq!(reloaded.load_all().await, 0);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Round Trip", "Survives a reload");
    script.metadata.tags = vec!["demo".to_string()];
    assert!(repo.save(&mut script).await);

    let mut reloaded = repository(temp_dir.path());
    assert_eq!(reloaded.load_all().await, 1);

    let loaded = reloaded.get_by_id(script.id()).unwrap();
    assert_eq!(loaded.name(), "Round Trip");
    assert_eq!(loaded.metadata.description, "Survives a reload");
    assert_eq!(loaded.metadata.tags, vec!["demo"]);
    assert_eq!(loaded.source_code, script.source_code);
    assert!(!loaded.is_compiled);
}

#[tokio::test]
async fn test_load_without_metadata_uses_file_name() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("Docs_0123abcd.qs"), "// empty").unwrap();
    fs::write(temp_dir.path().join("loose.qs"), "// empty").unwrap();
    fs::write(temp_dir.path().join("broken_89abcdef.qs"), "// empty").unwrap();
    fs::write(temp_dir.path().join("broken_89abcdef.meta"), "{ not json").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    let mut repo = repository(temp_dir.path());
    assert_eq!(repo.load_all().await, 3);

    let names: Vec<_> = repo.get_all().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["Docs", "broken", "loose"]);
}

#[tokio::test]
async fn test_load_all_creates_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("scripts");
    let mut repo = repository(&dir);
    assert_eq!(repo.load_all().await, 0);
    assert!(dir.is_dir());
}

#[tokio::test]
async fn test_compile_and_register_success() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Fixed", "");
    script.set_source(connector_source("fixed", "Fixed"));
    script.last_compilation_errors = vec!["stale".to_string()];
    assert!(repo.save(&mut script).await);

    let result = repo.compile_and_register(&mut script).await;
    assert!(result.success);
    assert!(script.is_compiled);
    assert!(script.last_compilation_errors.is_empty());
    assert!(repo.get_by_id(script.id()).unwrap().is_compiled);
    assert_eq!(repo.get_instance(script.id()).unwrap().id(), "fixed");
    assert_eq!(repo.registry().ids().await, vec!["fixed"]);
}

#[tokio::test]
async fn test_compile_failure_records_errors() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Broken", "");
    script.set_source("connector {");
    assert!(repo.save(&mut script).await);

    let result = repo.compile_and_register(&mut script).await;
    assert!(!result.success);
    assert!(!script.is_compiled);
    assert!(!script.last_compilation_errors.is_empty());
    assert_eq!(
        repo.get_by_id(script.id()).unwrap().last_compilation_errors,
        script.last_compilation_errors
    );
    assert!(repo.get_instance(script.id()).is_none());
    assert!(repo.registry().is_empty().await);
}

#[tokio::test]
async fn test_script_without_connector_is_not_registered() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Helpers", "");
    script.set_source("fn helper() { return 1; }");

    let result = repo.compile_and_register(&mut script).await;
    assert!(result.success);
    assert!(result.connector.is_none());
    assert!(!script.is_compiled);
    assert_eq!(script.last_compilation_errors.len(), 1);
    assert!(repo.registry().is_empty().await);
}

#[tokio::test]
async fn test_duplicate_connector_id_last_compile_wins() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());

    let mut first = repo.create("First", "");
    first.set_source(connector_source("shared", "First"));
    let mut second = repo.create("Second", "");
    second.set_source(connector_source("shared", "Second"));

    repo.compile_and_register(&mut first).await;
    let result = repo.compile_and_register(&mut second).await;
    assert_eq!(result.connector.unwrap().name(), "Second");

    let registry = repo.registry();
    assert_eq!(registry.len().await, 1);
    let registered = registry.get("shared").await.unwrap();
    assert_eq!(registered.name(), "Second");
    assert_eq!(repo.get_instance(first.id()).unwrap().name(), "First");
}

#[tokio::test]
async fn test_compile_all_skips_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());

    let mut good = repo.create("Good", "");
    good.set_source(connector_source("good", "Good"));
    let mut bad = repo.create("Bad", "");
    bad.set_source("fn f( {");
    let mut off = repo.create("Off", "");
    off.metadata.is_enabled = false;
    for script in [&mut good, &mut bad, &mut off] {
        assert!(repo.save(script).await);
    }

    let summary = repo.compile_all().await;
    assert_eq!(
        summary,
        CompileSummary {
            succeeded: 1,
            failed: 1,
            skipped: 1
        }
    );
    assert!(repo.get_by_id(good.id()).unwrap().is_compiled);
    assert!(!repo.get_by_id(bad.id()).unwrap().is_compiled);
    assert_eq!(repo.registry().ids().await, vec!["good"]);
}

#[tokio::test]
async fn test_delete() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Gone", "");
    script.set_source(connector_source("gone", "Gone"));
    assert!(repo.save(&mut script).await);
    repo.compile_and_register(&mut script).await;

    let path = script.file_path.clone().unwrap();
    assert!(repo.delete(script.id()));
    assert!(!path.exists());
    assert!(!path.with_extension("meta").exists());
    assert!(repo.get_by_id(script.id()).is_none());
    assert!(repo.get_instance(script.id()).is_none());

    assert!(!repo.delete(script.id()));
    assert!(!repo.delete("unknown"));
}

#[tokio::test]
async fn test_import_assigns_new_identity() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut original = repo.create("Shared", "From a friend");
    assert!(repo.save(&mut original).await);

    let other_dir = TempDir::new().unwrap();
    let mut other = repository(other_dir.path());
    let imported = other
        .import(original.file_path.as_ref().unwrap())
        .await
        .unwrap();

    assert_ne!(imported.id(), original.id());
    assert_eq!(imported.name(), "Shared");
    assert_eq!(imported.metadata.description, "From a friend");
    assert_eq!(imported.source_code, original.source_code);
    assert!(imported.file_path.is_none());
    assert!(!imported.is_compiled);
    assert!(other.get_by_id(imported.id()).is_some());
}

#[tokio::test]
async fn test_import_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let err = repo
        .import(&temp_dir.path().join("missing.qs"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ImportNotFound(_)));
}

#[tokio::test]
async fn test_export_writes_source() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Exported", "");
    assert!(repo.save(&mut script).await);

    let target = temp_dir.path().join("copy.txt");
    assert!(repo.export(script.id(), &target).await);
    assert_eq!(fs::read_to_string(&target).unwrap(), script.source_code);

    assert!(!repo.export("unknown", &target).await);
    assert!(!repo.export(script.id(), &temp_dir.path().join("no/such/dir.qs")).await);
}

#[tokio::test]
async fn test_update() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Updated", "");
    script.set_source(connector_source("updated", "Updated"));
    assert!(repo.save(&mut script).await);
    repo.compile_and_register(&mut script).await;
    let saved_at = repo.get_by_id(script.id()).unwrap().metadata.modified_at;

    script.metadata.description = "Changed".to_string();
    assert!(repo.update(&script));

    let stored = repo.get_by_id(script.id()).unwrap();
    assert_eq!(stored.metadata.description, "Changed");
    assert!(!stored.is_compiled);
    assert!(stored.metadata.modified_at >= saved_at);
    assert!(repo.get_instance(script.id()).is_none());

    let unknown = repo.create("Unknown", "");
    assert!(!repo.update(&unknown));
}

#[tokio::test]
async fn test_resolve_id_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let mut repo = repository(temp_dir.path());
    let mut script = repo.create("Prefixed", "");
    assert!(repo.save(&mut script).await);

    let id = script.id().to_string();
    assert_eq!(repo.resolve_id(&id[..8]), Some(id.as_str()));
    assert_eq!(repo.resolve_id(&id), Some(id.as_str()));
    assert_eq!(repo.resolve_id(""), None);
    assert_eq!(repo.resolve_id("zzzz"), None);
}
