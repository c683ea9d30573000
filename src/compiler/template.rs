//! Starter source for new connector scripts

/// Identifier fragment used when a name has no usable characters
const FALLBACK_NAME: &str = "Custom";

/// Connector declaration name derived from a display name
///
/// Keeps alphanumeric characters only; a leading digit gets a `Script` prefix.
pub fn type_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
    let base = if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else if cleaned.starts_with(|c: char| c.is_numeric()) {
        format!("Script{}", cleaned)
    } else {
        cleaned
    };
    format!("{}Connector", base)
}

/// Quote `text` as a script string literal
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Source for a new connector named `name` with capability id `id`
///
/// Placeholders are filled in a single pass, so placeholder text inside
/// `name` or `id` is embedded verbatim.
pub fn template(name: &str, id: &str) -> String {
    let fills = [
        ("{{TYPE}}", type_name(name)),
        ("{{ID}}", string_literal(id)),
        ("{{NAME}}", string_literal(name)),
    ];

    let mut out = String::with_capacity(TEMPLATE.len() + name.len() + id.len());
    let mut rest = TEMPLATE;
    while let Some((at, key, value)) = fills
        .iter()
        .filter_map(|(key, value)| rest.find(key).map(|at| (at, *key, value)))
        .min_by_key(|(at, _, _)| *at)
    {
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + key.len()..];
    }
    out.push_str(rest);
    out
}

const TEMPLATE: &str = r#"// Searches a configurable list of items.
// Replace the body of `search` to query your own data source.

use host;
use collections;
use ui;

connector {{TYPE}} {
    id = {{ID}};
    name = {{NAME}};
    description = "Searches a configurable list of items";
    version = "1.0.0";
    icon = "search";

    parameters = [
        {
            key: "items",
            label: "Items",
            description: "Comma separated values to search",
            kind: "string",
            required: false,
            default: "alpha,beta,gamma"
        }
    ];

    items = [];

    fn initialize(config) {
        self.items = split(host.config_string("items", "alpha,beta,gamma"), ",");
        host.log_info("Loaded " + to_string(len(self.items)) + " items");
        return true;
    }

    fn search(query, max_results) {
        let needle = lower(trim(query));
        let results = [];
        for item in self.items {
            let value = trim(item);
            if contains(lower(value), needle) {
                results = push(results, {
                    id: value,
                    title: value,
                    description: "Matches '" + query + "'",
                    score: 1.0,
                    actions: [{id: "log", label: "Log"}]
                });
            }
        }
        return collections.take(results, max_results);
    }

    fn detail_view() {
        return {showDescription: true, fields: [], useCustomView: true};
    }

    fn custom_view(result) {
        return ui.stack([
            ui.heading(result.title),
            ui.text(result.description)
        ]);
    }

    fn execute_action(action, result) {
        if action.id == "log" {
            host.log_info("Selected " + result.title);
            return true;
        }
        return false;
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::surface::reference_surface;
    use rstest::rstest;

    #[rstest]
    #[case("Acme", "AcmeConnector")]
    #[case("My Wiki!", "MyWikiConnector")]
    #[case("42 notes", "Script42notesConnector")]
    #[case("", "CustomConnector")]
    #[case("---", "CustomConnector")]
    fn test_type_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(type_name(name), expected);
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal(r#"say "hi"\n"#), r#""say \"hi\"\\n""#);
        assert_eq!(string_literal("a\nb"), r#""a\nb""#);
    }

    #[test]
    fn test_template_checks_cleanly() {
        let source = template("Acme \"Docs\"", "abc-123");
        assert!(source.contains("connector AcmeDocsConnector"));
        assert!(source.contains("id = \"abc-123\";"));
        assert!(source.contains(r#"name = "Acme \"Docs\"";"#));

        let checked = quarry_script::load(&source, &reference_surface()).unwrap();
        assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);
    }

    #[rstest]
    #[case("Acme", "x{{NAME}}y")]
    #[case("{{ID}}", "abc-123")]
    #[case("{{TYPE}}", "{{TYPE}}")]
    fn test_placeholder_text_is_embedded_verbatim(#[case] name: &str, #[case] id: &str) {
        let source = template(name, id);
        assert!(source.contains(&format!("id = {};", string_literal(id))));
        assert!(source.contains(&format!("name = {};", string_literal(name))));
        assert!(source.contains(&format!("connector {} {{", type_name(name))));
        assert_eq!(source.matches("{{").count(), format!("{}{}", name, id).matches("{{").count());
    }
}
