//! Script records managed by the repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Descriptive metadata stored next to each script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptMetadata {
    /// Unique script identifier (UUID v4)
    pub id: String,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Script version
    #[serde(default = "default_version")]
    pub version: String,

    /// Author
    #[serde(default)]
    pub author: String,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,

    /// Whether the script takes part in bulk compilation
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_enabled() -> bool {
    true
}

impl ScriptMetadata {
    /// Metadata with a fresh id and default values
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            version: default_version(),
            author: String::new(),
            created_at: now,
            modified_at: now,
            is_enabled: true,
            tags: Vec::new(),
        }
    }

    /// First eight characters of the id, used in file names
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((index, _)) => &self.id[..index],
            None => &self.id,
        }
    }
}

/// A user-authored connector script
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorScript {
    /// Script metadata
    pub metadata: ScriptMetadata,

    /// Script source
    pub source_code: String,

    /// Location of the source file, `None` until first saved
    pub file_path: Option<PathBuf>,

    /// Whether the last compilation produced a registered connector
    pub is_compiled: bool,

    /// Messages from the last unsuccessful compilation
    pub last_compilation_errors: Vec<String>,
}

impl ConnectorScript {
    pub fn new(metadata: ScriptMetadata, source_code: impl Into<String>) -> Self {
        Self {
            metadata,
            source_code: source_code.into(),
            file_path: None,
            is_compiled: false,
            last_compilation_errors: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Replace the source and invalidate the compiled state
    pub fn set_source(&mut self, source_code: impl Into<String>) {
        self.source_code = source_code.into();
        self.is_compiled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let metadata = ScriptMetadata::new("Docs", "Search docs");
        assert_eq!(metadata.version, "1.0.0");
        assert!(metadata.is_enabled);
        assert_eq!(metadata.short_id().len(), 8);
        assert_ne!(metadata.id, ScriptMetadata::new("Docs", "").id);
    }

    #[test]
    fn test_metadata_json_is_camel_case() {
        let metadata = ScriptMetadata::new("Docs", "");
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("isEnabled").is_some());

        let sparse: ScriptMetadata =
            serde_json::from_str(r#"{"id": "abc", "name": "Sparse"}"#).unwrap();
        assert_eq!(sparse.version, "1.0.0");
        assert!(sparse.is_enabled);
        assert!(sparse.tags.is_empty());
    }

    #[test]
    fn test_set_source_resets_compiled_state() {
        let mut script = ConnectorScript::new(ScriptMetadata::new("Docs", ""), "");
        script.is_compiled = true;
        script.set_source("connector X {}");
        assert!(!script.is_compiled);
    }
}
