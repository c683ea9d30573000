//! Persistent store of connector scripts
//!
//! Each script is stored as `<name>_<id8>.<ext>` holding the source and a
//! `<name>_<id8>.meta` sidecar holding its metadata as camelCase JSON.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use quarry_connector::Connector;

use crate::compiler::{CompilationResult, ScriptCompiler};
use crate::config::scripts::SCRIPT_EXTENSION;
use crate::model::{ConnectorScript, ScriptMetadata};
use crate::registry::ConnectorRegistry;
use crate::utils;

#[cfg(test)]
mod tests;

/// Extension of metadata sidecar files
pub const METADATA_EXTENSION: &str = "meta";

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Import source not found: {0}")]
    ImportNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of [`ScriptRepository::compile_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Scripts that produced a registered connector
    pub succeeded: usize,

    /// Scripts that failed to compile or produced no connector
    pub failed: usize,

    /// Disabled scripts that were not compiled
    pub skipped: usize,
}

/// Script store backed by one directory
pub struct ScriptRepository {
    directory: PathBuf,
    extension: String,
    compiler: Arc<dyn ScriptCompiler>,
    registry: Arc<ConnectorRegistry>,
    scripts: HashMap<String, ConnectorScript>,
    instances: HashMap<String, Arc<dyn Connector>>,
}

impl ScriptRepository {
    /// Create a repository over `directory`; nothing is read until [`ScriptRepository::load_all`]
    pub fn new(
        directory: impl Into<PathBuf>,
        compiler: Arc<dyn ScriptCompiler>,
        registry: Arc<ConnectorRegistry>,
    ) -> Self {
        Self {
            directory: directory.into(),
            extension: SCRIPT_EXTENSION.to_string(),
            compiler,
            registry,
            scripts: HashMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Use a different source file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.registry
    }

    pub fn compiler(&self) -> &Arc<dyn ScriptCompiler> {
        &self.compiler
    }

    /// New script with a fresh id and template source; not saved or tracked
    pub fn create(&self, name: &str, description: &str) -> ConnectorScript {
        let metadata = ScriptMetadata::new(name, description);
        let source = self.compiler.template(name, &metadata.id);
        ConnectorScript::new(metadata, source)
    }

    /// File stem for a script: sanitized name plus the short id
    fn file_stem(metadata: &ScriptMetadata) -> String {
        let name = utils::sanitize_filename(metadata.name.trim());
        let name = if name.is_empty() { "script" } else { &name };
        format!("{}_{}", name, metadata.short_id())
    }

    fn metadata_path(source_path: &Path) -> PathBuf {
        source_path.with_extension(METADATA_EXTENSION)
    }

    /// Write the script's source and metadata and track it
    ///
    /// Returns `false` when the files could not be written.
    pub async fn save(&mut self, script: &mut ConnectorScript) -> bool {
        match self.write_files(script).await {
            Ok(()) => {
                debug!("Saved script '{}' to {:?}", script.name(), script.file_path);
                self.scripts.insert(script.id().to_string(), script.clone());
                true
            }
            Err(e) => {
                error!("Failed to save script '{}': {}", script.name(), e);
                false
            }
        }
    }

    /// Sibling path a file is written to before it replaces `path`
    fn staging_path(path: &Path) -> PathBuf {
        let mut staged = path.as_os_str().to_owned();
        staged.push(".tmp");
        PathBuf::from(staged)
    }

    /// Write both files to staging paths, then move them into place
    ///
    /// The script is only updated once both files are written.
    async fn write_files(&self, script: &mut ConnectorScript) -> anyhow::Result<()> {
        utils::ensure_directory(&self.directory)?;

        let mut metadata = script.metadata.clone();
        metadata.modified_at = Utc::now();
        let path = self
            .directory
            .join(format!("{}.{}", Self::file_stem(&metadata), self.extension));
        let meta_path = Self::metadata_path(&path);
        let staged_source = Self::staging_path(&path);
        let staged_meta = Self::staging_path(&meta_path);

        let written = async {
            let json = serde_json::to_string_pretty(&metadata)?;
            tokio::fs::write(&staged_source, &script.source_code).await?;
            tokio::fs::write(&staged_meta, json).await?;
            tokio::fs::rename(&staged_source, &path).await?;
            tokio::fs::rename(&staged_meta, &meta_path).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;
        if let Err(e) = written {
            for staged in [&staged_source, &staged_meta] {
                if let Err(cleanup) = utils::remove_file_if_exists(staged) {
                    debug!("Could not remove staged file {:?}: {}", staged, cleanup);
                }
            }
            return Err(e);
        }
        script.metadata = metadata;

        if let Some(previous) = script.file_path.as_ref().filter(|p| **p != path) {
            for old in [previous.clone(), Self::metadata_path(previous)] {
                if let Err(e) = utils::remove_file_if_exists(&old) {
                    warn!("Failed to remove old script file {:?}: {}", old, e);
                }
            }
        }

        script.file_path = Some(path);
        Ok(())
    }

    /// Replace the tracked scripts with the ones stored on disk
    ///
    /// Unreadable files are logged and skipped. Returns the number loaded.
    pub async fn load_all(&mut self) -> usize {
        if let Err(e) = utils::ensure_directory(&self.directory) {
            error!("Cannot use script directory {:?}: {}", self.directory, e);
            return 0;
        }

        let files = match utils::find_files_with_extension(&self.directory, &self.extension) {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to scan script directory {:?}: {}", self.directory, e);
                return 0;
            }
        };

        let mut scripts: HashMap<String, ConnectorScript> = HashMap::new();
        for path in files {
            match Self::read_script(&path).await {
                Ok(script) => {
                    if let Some(existing) = scripts.get(script.id()) {
                        warn!(
                            "Script id {} in {:?} already loaded from {:?}, keeping the later file",
                            script.id(),
                            path,
                            existing.file_path
                        );
                    }
                    scripts.insert(script.id().to_string(), script);
                }
                Err(e) => warn!("Skipping script {:?}: {}", path, e),
            }
        }

        self.scripts = scripts;
        self.instances.clear();
        info!(
            "Loaded {} script(s) from {:?}",
            self.scripts.len(),
            self.directory
        );
        self.scripts.len()
    }

    async fn read_script(path: &Path) -> anyhow::Result<ConnectorScript> {
        let source = tokio::fs::read_to_string(path).await?;
        let metadata = Self::read_metadata(path).await;
        let mut script = ConnectorScript::new(metadata, source);
        script.file_path = Some(path.to_path_buf());
        Ok(script)
    }

    /// Sidecar metadata, or metadata derived from the file name
    async fn read_metadata(source_path: &Path) -> ScriptMetadata {
        let meta_path = Self::metadata_path(source_path);
        match tokio::fs::read_to_string(&meta_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(metadata) => return metadata,
                Err(e) => warn!("Ignoring unreadable metadata {:?}: {}", meta_path, e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No metadata for {:?}", source_path)
            }
            Err(e) => warn!("Ignoring unreadable metadata {:?}: {}", meta_path, e),
        }
        ScriptMetadata::new(name_from_path(source_path), "")
    }

    /// Compile a script and register its connector
    ///
    /// On success the connector is cached under the script id and registered
    /// under its own id; otherwise the problems are recorded on the script.
    pub async fn compile_and_register(&mut self, script: &mut ConnectorScript) -> CompilationResult {
        let result = self.compiler.compile_async(script).await;

        match result.connector.as_ref().filter(|_| result.success) {
            Some(connector) => {
                script.is_compiled = true;
                script.last_compilation_errors.clear();
                self.instances
                    .insert(script.id().to_string(), Arc::clone(connector));
                self.registry.register(Arc::clone(connector)).await;
            }
            None => {
                script.is_compiled = false;
                script.last_compilation_errors = result.problem_messages();
                self.instances.remove(script.id());
            }
        }

        if let Some(stored) = self.scripts.get_mut(script.id()) {
            stored.is_compiled = script.is_compiled;
            stored
                .last_compilation_errors
                .clone_from(&script.last_compilation_errors);
        }
        result
    }

    /// Compile every enabled script, one at a time, ordered by name then id
    pub async fn compile_all(&mut self) -> CompileSummary {
        let mut summary = CompileSummary::default();
        let mut queue: Vec<ConnectorScript> = Vec::new();
        for script in self.scripts.values() {
            if script.metadata.is_enabled {
                queue.push(script.clone());
            } else {
                summary.skipped += 1;
            }
        }
        queue.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));

        for mut script in queue {
            let result = self.compile_and_register(&mut script).await;
            if result.success && result.connector.is_some() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "Compiled scripts: {} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        summary
    }

    /// Forget a script and remove its files; `false` for unknown ids
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(script) = self.scripts.remove(id) else {
            return false;
        };
        self.instances.remove(id);

        if let Some(path) = &script.file_path {
            for file in [path.clone(), Self::metadata_path(path)] {
                if let Err(e) = utils::remove_file_if_exists(&file) {
                    warn!("Failed to remove {:?}: {}", file, e);
                }
            }
        }
        info!("Deleted script '{}'", script.name());
        true
    }

    /// Track a copy of an external script file under a fresh id
    ///
    /// The copy is not saved until [`ScriptRepository::save`] is called.
    pub async fn import(&mut self, path: &Path) -> Result<ConnectorScript, RepositoryError> {
        if !path.is_file() {
            return Err(RepositoryError::ImportNotFound(path.to_path_buf()));
        }

        let source = tokio::fs::read_to_string(path).await?;
        let mut metadata = Self::read_metadata(path).await;
        let now = Utc::now();
        metadata.id = uuid::Uuid::new_v4().to_string();
        metadata.created_at = now;
        metadata.modified_at = now;

        let script = ConnectorScript::new(metadata, source);
        self.scripts.insert(script.id().to_string(), script.clone());
        info!("Imported script '{}' from {:?}", script.name(), path);
        Ok(script)
    }

    /// Write a script's source to `path`
    pub async fn export(&self, id: &str, path: &Path) -> bool {
        let Some(script) = self.scripts.get(id) else {
            warn!("Cannot export unknown script {}", id);
            return false;
        };
        match tokio::fs::write(path, &script.source_code).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to export script '{}' to {:?}: {}", script.name(), path, e);
                false
            }
        }
    }

    /// Replace a tracked script; `false` for unknown ids
    ///
    /// The compiled state is reset and the cached connector dropped; the
    /// files are only rewritten by [`ScriptRepository::save`].
    pub fn update(&mut self, script: &ConnectorScript) -> bool {
        let Some(stored) = self.scripts.get_mut(script.id()) else {
            return false;
        };
        *stored = script.clone();
        stored.metadata.modified_at = Utc::now();
        stored.is_compiled = false;
        self.instances.remove(script.id());
        true
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ConnectorScript> {
        self.scripts.get(id)
    }

    /// All tracked scripts sorted by name
    pub fn get_all(&self) -> Vec<&ConnectorScript> {
        let mut scripts: Vec<_> = self.scripts.values().collect();
        scripts.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        scripts
    }

    /// Connector built from the script by the last successful compilation
    pub fn get_instance(&self, id: &str) -> Option<Arc<dyn Connector>> {
        self.instances.get(id).cloned()
    }

    /// Resolve a full id or an unambiguous id prefix
    pub fn resolve_id(&self, id_or_prefix: &str) -> Option<&str> {
        if let Some(script) = self.scripts.get(id_or_prefix) {
            return Some(script.id());
        }
        let mut matches = self
            .scripts
            .keys()
            .filter(|id| !id_or_prefix.is_empty() && id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Script name recovered from a `<name>_<id8>` file stem
fn name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((name, suffix))
            if !name.is_empty()
                && suffix.len() == 8
                && suffix.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            name.to_string()
        }
        _ => stem,
    }
}
