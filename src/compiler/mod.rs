//! Compiler service: turns connector scripts into live connectors

use async_trait::async_trait;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use quarry_connector::Connector;
use quarry_script::{parser, ReferenceSurface, DEFAULT_MAX_CALL_DEPTH};

use crate::config::CompilerConfig;
use crate::model::ConnectorScript;

pub mod completion;
pub mod diagnostics;
pub mod loader;
pub mod surface;
pub mod template;

pub use completion::{CompletionItem, CompletionKind, MAX_COMPLETIONS};
pub use diagnostics::{translate, CompilationError, ErrorKind, ErrorSeverity};
pub use loader::{instantiate, CompiledUnit, InstantiationError, ScriptedConnector};

#[cfg(test)]
mod tests;

/// Outcome of compiling one script
#[derive(Clone, Default)]
pub struct CompilationResult {
    /// No error-severity diagnostics were produced
    pub success: bool,

    pub errors: Vec<CompilationError>,

    pub warnings: Vec<CompilationError>,

    /// Checked program, present on success
    pub unit: Option<Arc<CompiledUnit>>,

    /// Instantiated connector, present when one could be constructed
    pub connector: Option<Arc<dyn Connector>>,
}

impl CompilationResult {
    fn failure(errors: Vec<CompilationError>, warnings: Vec<CompilationError>) -> Self {
        Self {
            success: false,
            errors,
            warnings,
            ..Default::default()
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::failure(vec![CompilationError::internal(message)], Vec::new())
    }

    /// Errors followed by instantiation warnings, formatted for storage
    pub fn problem_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(
                self.warnings
                    .iter()
                    .filter(|w| w.kind == ErrorKind::Instantiation),
            )
            .map(ToString::to_string)
            .collect()
    }
}

impl std::fmt::Debug for CompilationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationResult")
            .field("success", &self.success)
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .field("connector", &self.connector.as_ref().map(|c| c.id().to_string()))
            .finish()
    }
}

/// Compiler service used by the repository and the CLI
#[async_trait]
pub trait ScriptCompiler: Send + Sync {
    /// Compile and instantiate a script
    fn compile(&self, script: &ConnectorScript) -> CompilationResult;

    /// [`ScriptCompiler::compile`] on a blocking worker thread
    async fn compile_async(&self, script: &ConnectorScript) -> CompilationResult;

    /// Syntax diagnostics only
    fn validate(&self, source: &str) -> Vec<CompilationError>;

    /// Completion items for the cursor at byte `offset`
    fn completions(&self, source: &str, offset: usize) -> Vec<CompletionItem>;

    /// Starter source for a new connector
    fn template(&self, name: &str, id: &str) -> String;
}

/// Compiler for Quarry connector scripts
#[derive(Debug, Clone)]
pub struct QuarryCompiler {
    surface: Arc<ReferenceSurface>,
    max_call_depth: usize,
    max_completions: usize,
}

impl Default for QuarryCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl QuarryCompiler {
    /// Create a compiler with default limits
    pub fn new() -> Self {
        Self {
            surface: Arc::new(surface::reference_surface()),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_completions: MAX_COMPLETIONS,
        }
    }

    /// Create a compiler with limits from configuration
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth,
            max_completions: config.max_completions.min(MAX_COMPLETIONS),
            ..Self::new()
        }
    }

    /// Surface scripts are checked against
    pub fn surface(&self) -> &Arc<ReferenceSurface> {
        &self.surface
    }

    fn compile_source(&self, source: &str) -> CompilationResult {
        let checked = match quarry_script::load(source, &self.surface) {
            Ok(checked) => checked,
            Err(err) => {
                let (errors, warnings) = translate(&err.diagnostics)
                    .into_iter()
                    .partition(CompilationError::is_error);
                return CompilationResult::failure(errors, warnings);
            }
        };

        let mut warnings = translate(&checked.diagnostics);
        let unit = Arc::new(CompiledUnit {
            program: checked.program,
            surface: Arc::clone(&self.surface),
            max_call_depth: self.max_call_depth,
        });

        let connector: Option<Arc<dyn Connector>> = match instantiate(Arc::clone(&unit)) {
            Ok(Some(connector)) => Some(Arc::new(connector)),
            Ok(None) => {
                warnings.push(CompilationError::instantiation(
                    "Script declares no concrete connector",
                    0,
                    0,
                ));
                None
            }
            Err(err) => {
                let (line, column) = err
                    .span
                    .map_or((0, 0), |s| (s.start.line + 1, s.start.column + 1));
                warnings.push(CompilationError::instantiation(err.message, line, column));
                None
            }
        };

        CompilationResult {
            success: true,
            errors: Vec::new(),
            warnings,
            unit: Some(unit),
            connector,
        }
    }

    /// [`QuarryCompiler::compile_source`] with panics turned into an internal error
    fn compile_guarded(&self, source: &str) -> CompilationResult {
        panic::catch_unwind(AssertUnwindSafe(|| self.compile_source(source))).unwrap_or_else(
            |payload| {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("Compiler panicked: {}", reason);
                CompilationResult::internal(format!("Internal compiler error: {}", reason))
            },
        )
    }

    fn log_result(script: &ConnectorScript, result: &CompilationResult) {
        match &result.connector {
            Some(connector) => info!(
                "Compiled script '{}' as connector '{}'",
                script.name(),
                connector.id()
            ),
            None if result.success => info!(
                "Compiled script '{}' without a connector ({} warning(s))",
                script.name(),
                result.warnings.len()
            ),
            None => info!(
                "Script '{}' failed to compile with {} error(s)",
                script.name(),
                result.errors.len()
            ),
        }
        for diagnostic in result.errors.iter().chain(&result.warnings) {
            debug!(script = %script.id(), "{}", diagnostic);
        }
    }
}

#[async_trait]
impl ScriptCompiler for QuarryCompiler {
    fn compile(&self, script: &ConnectorScript) -> CompilationResult {
        let result = self.compile_guarded(&script.source_code);
        Self::log_result(script, &result);
        result
    }

    async fn compile_async(&self, script: &ConnectorScript) -> CompilationResult {
        let compiler = self.clone();
        let source = script.source_code.clone();
        let result = tokio::task::spawn_blocking(move || compiler.compile_guarded(&source))
            .await
            .unwrap_or_else(|e| {
                warn!("Compile task failed: {}", e);
                CompilationResult::internal(format!("Compilation task failed: {}", e))
            });
        Self::log_result(script, &result);
        result
    }

    fn validate(&self, source: &str) -> Vec<CompilationError> {
        let (_, diagnostics) = parser::parse(source);
        translate(&diagnostics)
    }

    fn completions(&self, source: &str, offset: usize) -> Vec<CompletionItem> {
        completion::complete(&self.surface, source, offset, self.max_completions)
    }

    fn template(&self, name: &str, id: &str) -> String {
        template::template(name, id)
    }
}
