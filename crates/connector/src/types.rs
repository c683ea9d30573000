//! Data exchanged between connectors and the host

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration values supplied by the host, keyed by parameter key
pub type ConnectorConfig = HashMap<String, serde_json::Value>;

/// A single search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    /// Result identifier, unique within one connector's result set
    pub id: String,

    /// Primary text
    pub title: String,

    /// Secondary text
    pub description: String,

    /// Link opened by the default action
    pub url: Option<String>,

    /// Icon hint
    pub icon: Option<String>,

    /// Relevance score, higher is better
    pub score: f64,

    /// Id of the connector that produced the result, filled by the host
    pub connector_id: String,

    /// Arbitrary extra fields shown in the detail view
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Actions offered for this result
    pub actions: Vec<ResultAction>,
}

impl SearchResult {
    /// Create a result with an id and a title
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Action attached to a search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultAction {
    /// Action identifier passed back to `execute_action`
    pub id: String,

    /// Button label
    pub label: String,

    /// Icon hint
    pub icon: Option<String>,
}

impl ResultAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: None,
        }
    }
}

/// Kind of value a configuration parameter holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    String,
    Integer,
    Boolean,
    /// Masked in the UI
    Secret,
    /// File system path
    Path,
}

/// Declaration of a configuration value a connector expects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationParameter {
    /// Key under which the value is stored
    pub key: String,

    /// Label shown in the settings UI
    pub label: String,

    /// Help text
    pub description: String,

    /// Value kind
    pub kind: ParameterKind,

    /// Whether the host must collect a value before initializing
    pub required: bool,

    /// Value used when the user supplies none
    #[serde(rename = "default")]
    pub default_value: serde_json::Value,
}

/// Layout hints for the host's default detail view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailViewConfiguration {
    /// Show the result description above the fields
    pub show_description: bool,

    /// Metadata fields to display, in order
    pub fields: Vec<DetailField>,

    /// Render the connector's custom view instead of the default one
    pub use_custom_view: bool,
}

/// One labelled metadata field in the detail view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailField {
    pub label: String,

    /// Key into `SearchResult::metadata`
    pub key: String,
}

/// Minimal UI element tree a connector can hand to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UiElement {
    Text {
        text: String,
    },
    Heading {
        text: String,
    },
    Stack {
        #[serde(default)]
        children: Vec<UiElement>,
    },
    Row {
        #[serde(default)]
        children: Vec<UiElement>,
    },
    Link {
        label: String,
        url: String,
    },
    Button {
        label: String,
        action: String,
    },
    Image {
        source: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_result_from_partial_json() {
        let result: SearchResult = serde_json::from_value(json!({
            "title": "Quarterly report",
            "url": "https://example.com/q3",
            "score": 0.5,
            "actions": [{ "id": "open", "label": "Open" }]
        }))
        .unwrap();

        assert_eq!(result.title, "Quarterly report");
        assert_eq!(result.id, "");
        assert_eq!(result.url.as_deref(), Some("https://example.com/q3"));
        assert_eq!(result.actions, vec![ResultAction::new("open", "Open")]);
    }

    #[test]
    fn test_parameter_default_key() {
        let param: ConfigurationParameter = serde_json::from_value(json!({
            "key": "apiUrl",
            "label": "API URL",
            "kind": "secret",
            "default": "https://example.com"
        }))
        .unwrap();

        assert_eq!(param.kind, ParameterKind::Secret);
        assert!(!param.required);
        assert_eq!(param.default_value, json!("https://example.com"));
    }

    #[test]
    fn test_ui_element_tree() {
        let element: UiElement = serde_json::from_value(json!({
            "kind": "stack",
            "children": [
                { "kind": "heading", "text": "Title" },
                { "kind": "link", "label": "Open", "url": "https://example.com" }
            ]
        }))
        .unwrap();

        match element {
            UiElement::Stack { children } => assert_eq!(children.len(), 2),
            other => panic!("unexpected element: {:?}", other),
        }
    }
}
