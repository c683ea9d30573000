//! Loading compiled scripts as live connectors

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, warn};

use quarry_connector::{
    CancellationToken, ConfigurationParameter, Connector, ConnectorBase, ConnectorConfig,
    DetailViewConfiguration, ResultAction, SearchResult, UiElement,
};
use quarry_script::value::is_truthy;
use quarry_script::{
    Instance, Interpreter, LogLevel, Program, ReferenceSurface, RuntimeError, ScriptHost, Span,
};

/// An immutable, checked program ready to be instantiated
#[derive(Debug)]
pub struct CompiledUnit {
    /// Checked syntax tree
    pub program: Program,

    /// Surface the program was checked against
    pub surface: Arc<ReferenceSurface>,

    /// Call depth limit applied when running the program
    pub max_call_depth: usize,
}

impl CompiledUnit {
    /// Name of the connector declaration a connector is built from
    pub fn entry_connector(&self) -> Option<&str> {
        self.program
            .first_concrete_connector()
            .map(|c| c.name.name.as_str())
    }
}

/// Failure to construct a connector from a compiled unit
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InstantiationError {
    pub message: String,

    /// Source location responsible, when known
    pub span: Option<Span>,
}

impl InstantiationError {
    fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl From<RuntimeError> for InstantiationError {
    fn from(err: RuntimeError) -> Self {
        Self::new(format!("Connector construction failed: {}", err.message), err.span)
    }
}

/// Host services backed by a connector's captured configuration
struct CallHost<'a> {
    base: &'a ConnectorBase,
    cancel: Option<&'a CancellationToken>,
}

impl ScriptHost for CallHost<'_> {
    fn config_value(&self, key: &str) -> Option<Value> {
        self.base.get_value(key)
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => self.base.log_debug(message),
            LogLevel::Info => self.base.log_info(message),
            LogLevel::Warning => self.base.log_warning(message),
            LogLevel::Error => self.base.log_error(message),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.map_or(false, CancellationToken::is_cancelled)
    }
}

/// Construct the first concrete connector declared by `unit`
///
/// Returns `Ok(None)` when the script declares no concrete connector.
pub fn instantiate(unit: Arc<CompiledUnit>) -> Result<Option<ScriptedConnector>, InstantiationError> {
    let Some(entry) = unit.entry_connector().map(str::to_string) else {
        return Ok(None);
    };

    let construction_base = ConnectorBase::new(entry.clone());
    let host = CallHost {
        base: &construction_base,
        cancel: None,
    };
    let mut interpreter =
        Interpreter::new(&unit.program, &unit.surface, &host, unit.max_call_depth)?;
    let instance = interpreter.instantiate(&entry)?;
    let globals = interpreter.into_globals();

    let span = unit.program.connector(&entry).map(|c| c.name.span);
    let id = match instance.field("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(Value::String(_)) => {
            return Err(InstantiationError::new(
                format!("Connector '{}' has an empty id", entry),
                span,
            ))
        }
        _ => {
            return Err(InstantiationError::new(
                format!("Connector '{}' must set 'id' to a string", entry),
                span,
            ))
        }
    };

    let name = text_field(&instance, "name").unwrap_or_else(|| entry.clone());
    let description = text_field(&instance, "description").unwrap_or_default();
    let version = text_field(&instance, "version").unwrap_or_else(|| "1.0.0".to_string());
    let icon = text_field(&instance, "icon");
    let parameters = match instance.field("parameters") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => decode::<Vec<ConfigurationParameter>>(value.clone()).unwrap_or_else(|e| {
            warn!(connector = %id, "Ignoring malformed parameters: {}", e);
            Vec::new()
        }),
    };

    debug!(connector = %id, declaration = %entry, "Instantiated scripted connector");

    Ok(Some(ScriptedConnector {
        inner: Arc::new(Inner {
            base: ConnectorBase::new(id.clone()),
            id,
            name,
            description,
            version,
            icon,
            parameters,
            globals,
            instance: Mutex::new(instance),
            unit,
        }),
    }))
}

fn text_field(instance: &Instance, name: &str) -> Option<String> {
    match instance.field(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn encode<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// A connector whose behaviour is defined by a compiled script
///
/// Clones share the same instance state.
#[derive(Clone)]
pub struct ScriptedConnector {
    inner: Arc<Inner>,
}

struct Inner {
    unit: Arc<CompiledUnit>,
    globals: Map<String, Value>,
    instance: Mutex<Instance>,
    base: ConnectorBase,
    id: String,
    name: String,
    description: String,
    version: String,
    icon: Option<String>,
    parameters: Vec<ConfigurationParameter>,
}

impl Inner {
    /// Run `method` against the shared instance on the current thread
    fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Value>> {
        let host = CallHost {
            base: &self.base,
            cancel,
        };
        let mut interpreter = Interpreter::resume(
            &self.unit.program,
            &self.unit.surface,
            &host,
            &self.globals,
            self.unit.max_call_depth,
        );
        let mut instance = self.instance.lock().unwrap_or_else(|e| e.into_inner());
        interpreter.invoke(&mut instance, method, args).map_err(|err| {
            if err.is_cancelled() {
                debug!(connector = %self.id, method, "Script call cancelled");
            } else {
                error!(connector = %self.id, method, "Script error: {}", err);
            }
            anyhow!("{}.{} failed: {}", self.id, method, err)
        })
    }
}

impl ScriptedConnector {
    /// The compiled unit this connector runs
    pub fn unit(&self) -> &Arc<CompiledUnit> {
        &self.inner.unit
    }

    /// Snapshot of a property on the underlying instance
    pub fn property(&self, name: &str) -> Option<Value> {
        let instance = self.inner.instance.lock().unwrap_or_else(|e| e.into_inner());
        instance.field(name).cloned()
    }

    async fn call_blocking(
        &self,
        method: &'static str,
        args: Vec<Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Value>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.call(method, args, cancel.as_ref())).await?
    }

    /// Run a method for a synchronous hook on a thread outside any async runtime
    ///
    /// Errors, panics and `null` returns all yield `None`.
    fn call_detached(&self, method: &'static str, args: Vec<Value>) -> Option<Value> {
        let inner = &self.inner;
        let outcome = std::thread::scope(|scope| {
            scope.spawn(move || inner.call(method, args, None)).join()
        });
        match outcome {
            Ok(Ok(value)) => value.filter(|v| !v.is_null()),
            Ok(Err(_)) => None,
            Err(_) => {
                error!(connector = %self.inner.id, method, "Script call panicked");
                None
            }
        }
    }
}

impl std::fmt::Debug for ScriptedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConnector")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn description(&self) -> &str {
        &self.inner.description
    }

    fn version(&self) -> &str {
        &self.inner.version
    }

    fn icon(&self) -> Option<&str> {
        self.inner.icon.as_deref()
    }

    fn configuration_parameters(&self) -> Vec<ConfigurationParameter> {
        self.inner.parameters.clone()
    }

    async fn initialize(&self, config: ConnectorConfig) -> Result<bool> {
        let value = Value::Object(config.clone().into_iter().collect());
        self.inner.base.capture(config);
        let accepted = self
            .call_blocking("initialize", vec![value], None)
            .await?
            .map_or(true, |v| v != Value::Bool(false));
        Ok(accepted)
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let args = vec![Value::from(query), Value::from(max_results as u64)];
        let returned = self
            .call_blocking("search", args, Some(cancel.clone()))
            .await?
            .unwrap_or(Value::Null);

        let items = match returned {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(anyhow!(
                    "{}.search must return a list, got {}",
                    self.inner.id,
                    quarry_script::value::type_name(&other)
                ))
            }
        };

        let mut results = Vec::with_capacity(items.len().min(max_results));
        for item in items.into_iter().take(max_results) {
            match decode::<SearchResult>(item) {
                Ok(mut result) => {
                    if result.connector_id.is_empty() {
                        result.connector_id = self.inner.id.clone();
                    }
                    results.push(result);
                }
                Err(e) => warn!(connector = %self.inner.id, "Skipping malformed result: {}", e),
            }
        }
        Ok(results)
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(self
            .call_blocking("test_connection", Vec::new(), None)
            .await?
            .map_or(true, |v| is_truthy(&v)))
    }

    fn detail_view_configuration(&self) -> Option<DetailViewConfiguration> {
        let value = self.call_detached("detail_view", Vec::new())?;
        decode(value)
            .map_err(|e| warn!(connector = %self.inner.id, "Malformed detail view: {}", e))
            .ok()
    }

    fn create_custom_detail_view(&self, result: &SearchResult) -> Option<UiElement> {
        let value = self.call_detached("custom_view", vec![encode(result)])?;
        decode(value)
            .map_err(|e| warn!(connector = %self.inner.id, "Malformed custom view: {}", e))
            .ok()
    }

    async fn execute_action(&self, action: &ResultAction, result: &SearchResult) -> Result<bool> {
        let args = vec![encode(action), encode(result)];
        Ok(self
            .call_blocking("execute_action", args, None)
            .await?
            .map_or(false, |v| is_truthy(&v)))
    }

    async fn dispose(&self) {
        if let Err(e) = self.call_blocking("dispose", Vec::new(), None).await {
            warn!(connector = %self.inner.id, "Dispose failed: {}", e);
        }
    }
}
