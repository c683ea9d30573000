use super::*;
use crate::model::ScriptMetadata;
use quarry_connector::CancellationToken;
use rstest::rstest;

fn script(source: &str) -> ConnectorScript {
    ConnectorScript::new(ScriptMetadata::new("Test", ""), source)
}

const MINIMAL: &str = r#"
connector Minimal {
    id = "minimal";
    name = "Minimal";

    fn search(query, max_results) {
        return [{id: "1", title: upper(query)}];
    }
}
"#;

#[test]
fn test_compile_produces_connector() {
    let result = QuarryCompiler::new().compile(&script(MINIMAL));
    assert!(result.success);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert!(result.unit.is_some());
    assert_eq!(result.connector.unwrap().id(), "minimal");
}

#[test]
fn test_syntax_error_is_positioned() {
    let result = QuarryCompiler::new().compile(&script("connector X {\n  id = ;\n}"));
    assert!(!result.success);
    assert!(result.connector.is_none());
    let error = &result.errors[0];
    assert_eq!(error.kind, ErrorKind::Syntax);
    assert_eq!((error.line, error.column), (2, 8));
}

#[rstest]
#[case("use fs;", "QS2001")]
#[case("fn f() { return json.parse(\"1\"); }", "QS2002")]
#[case("fn f() { return nope; }", "QS2003")]
fn test_semantic_errors(#[case] source: &str, #[case] code: &str) {
    let result = QuarryCompiler::new().compile(&script(source));
    assert!(!result.success);
    assert_eq!(result.errors[0].error_id, code);
    assert_eq!(result.errors[0].kind, ErrorKind::Semantic);
}

#[test]
fn test_no_connector_is_success_with_instantiation_warning() {
    let result = QuarryCompiler::new().compile(&script("fn helper() { return 1; }"));
    assert!(result.success);
    assert!(result.connector.is_none());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, ErrorKind::Instantiation);
    assert_eq!(result.problem_messages().len(), 1);
}

#[test]
fn test_construction_failure_is_positioned_warning() {
    let source = "connector Broken {\n    id = \"b\";\n    name = 1 / 0;\n    fn search(query, max_results) { return []; }\n}";
    let result = QuarryCompiler::new().compile(&script(source));
    assert!(result.success);
    assert!(result.connector.is_none());
    let warning = &result.warnings[0];
    assert_eq!(warning.error_id, diagnostics::INSTANTIATION_ERROR_ID);
    assert_eq!(warning.line, 3);
}

#[test]
fn test_empty_source() {
    let compiler = QuarryCompiler::new();
    assert!(compiler.validate("").is_empty());
    assert!(compiler.validate("   \n\t ").is_empty());

    let result = compiler.compile(&script(""));
    assert!(result.success);
    assert!(result.connector.is_none());
}

#[test]
fn test_validate_reports_syntax_only() {
    let compiler = QuarryCompiler::new();
    assert!(compiler.validate("fn f() { return nope; }").is_empty());

    let errors = compiler.validate("fn f( {");
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e.line > 0));
}

#[test]
fn test_top_level_statement_is_syntax_error() {
    let errors = QuarryCompiler::new().validate("let x = 1;");
    assert_eq!(errors[0].kind, ErrorKind::Syntax);
}

#[test]
fn test_template_compiles() {
    let compiler = QuarryCompiler::new();
    let source = compiler.template("Acme", "abc-123");
    assert!(source.contains("Acme"));
    assert!(source.contains("abc-123"));

    let result = compiler.compile(&script(&source));
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.connector.unwrap().id(), "abc-123");
}

#[tokio::test]
async fn test_compile_async_matches_compile() {
    let compiler = QuarryCompiler::new();
    let result = compiler.compile_async(&script(MINIMAL)).await;
    let connector = result.connector.unwrap();

    let results = connector
        .search("abc", 10, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(results[0].title, "ABC");
}

#[test]
fn test_config_limits() {
    let config = CompilerConfig {
        max_completions: 500,
        max_call_depth: 8,
    };
    let compiler = QuarryCompiler::from_config(&config);
    assert!(compiler.completions("", 0).len() <= MAX_COMPLETIONS);

    let recursive = r#"
fn down(n) { return down(n + 1); }
connector Deep {
    id = "deep";
    name = down(0);
    fn search(query, max_results) { return []; }
}
"#;
    let result = compiler.compile(&script(recursive));
    assert!(result.connector.is_none());
    assert!(result.warnings[0].message.contains("Maximum call depth of 8"));
}

fn long_sum_connector(terms: usize) -> String {
    format!(
        "connector X {{\n    id = \"x\";\n    name = \"X\";\n    total = 1{};\n    fn search(query, max_results) {{ return []; }}\n}}\n",
        " + 1".repeat(terms)
    )
}

#[tokio::test]
async fn test_long_operator_chain_is_positioned_error() {
    let compiler = QuarryCompiler::new();
    let source = long_sum_connector(10_000);

    let result = compiler.compile_async(&script(&source)).await;
    assert!(!result.success);
    assert!(result.connector.is_none());
    let error = &result.errors[0];
    assert_eq!(error.error_id, "QS1015");
    assert_eq!(error.line, 4);
    assert!(error.column > 0);

    assert!(!compiler.validate(&source).is_empty());
    assert!(compiler.completions(&source, source.len()).len() <= MAX_COMPLETIONS);
}

#[test]
fn test_short_operator_chain_compiles() {
    let result = QuarryCompiler::new().compile(&script(&long_sum_connector(50)));
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.connector.unwrap().id(), "x");
}

#[tokio::test]
async fn test_concurrent_completions_match_serial() {
    let compiler = Arc::new(QuarryCompiler::new());
    let sources: Vec<(String, usize)> = [
        "use collections;\nconnector A { fn search(q, m) { return collections.",
        "connector A { id = \"a\"; fn search(query, max_results) { let total = 1; ret",
        "use json;\nconnector A { ",
        "fn helper(value) { return up",
        "connector A { fn search(query, max_results) { return self.",
    ]
    .iter()
    .map(|s| (s.to_string(), s.len()))
    .collect();

    let serial: Vec<Vec<CompletionItem>> = sources
        .iter()
        .map(|(source, offset)| compiler.completions(source, *offset))
        .collect();

    let mut handles = Vec::new();
    for round in 0..8 {
        for (index, (source, offset)) in sources.iter().enumerate() {
            let compiler = Arc::clone(&compiler);
            let source = source.clone();
            let offset = *offset;
            handles.push((
                index,
                round,
                tokio::task::spawn_blocking(move || compiler.completions(&source, offset)),
            ));
        }
    }

    for (index, round, handle) in handles {
        let items = handle.await.unwrap();
        assert_eq!(items, serial[index], "source {} round {}", index, round);
    }
    assert!(serial.iter().all(|items| !items.is_empty()));
}
