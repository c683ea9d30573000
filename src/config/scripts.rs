//! Script storage configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extension of script source files
pub const SCRIPT_EXTENSION: &str = "qs";

/// Where scripts live and how they are loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Script directory; `~` is expanded
    pub directory: PathBuf,

    /// Compile every enabled script when the repository is opened
    pub compile_on_startup: bool,

    /// Source file extension, without the dot
    pub extension: String,
}

impl ScriptsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(anyhow!("Script directory must not be empty"));
        }

        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(anyhow!("Invalid script extension: {:?}", self.extension));
        }

        if self.extension == "meta" {
            return Err(anyhow!("Script extension clashes with metadata files"));
        }

        Ok(())
    }

    /// Script directory with `~` and environment variables expanded
    pub fn resolved_directory(&self) -> Result<PathBuf> {
        let raw = self.directory.to_string_lossy();
        let expanded = shellexpand::full(&raw)
            .map_err(|e| anyhow!("Failed to expand script directory {:?}: {}", raw, e))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            directory: crate::utils::default_scripts_dir()
                .unwrap_or_else(|_| PathBuf::from("./scripts")),
            compile_on_startup: true,
            extension: SCRIPT_EXTENSION.to_string(),
        }
    }
}
