//! Compiler limits

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::MAX_COMPLETIONS;

/// Limits applied by the compiler service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Completion items returned per request
    pub max_completions: usize,

    /// Call depth allowed when running connector scripts
    pub max_call_depth: usize,
}

impl CompilerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_completions == 0 || self.max_completions > MAX_COMPLETIONS {
            return Err(anyhow!(
                "max_completions must be between 1 and {}",
                MAX_COMPLETIONS
            ));
        }

        if self.max_call_depth == 0 {
            return Err(anyhow!("max_call_depth must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_completions: MAX_COMPLETIONS,
            max_call_depth: quarry_script::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}
