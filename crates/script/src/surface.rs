//! The reference surface: everything a script can resolve
//!
//! A [`ReferenceSurface`] is built once by the host and shared immutably by
//! the checker, the interpreter and completion. Names outside of it are
//! rejected at check time, so a script cannot reach anything the host did
//! not list.

use serde_json::Value;
use thiserror::Error;

use crate::modules;

/// Result returned by a native function
pub type NativeResult = Result<Value, NativeError>;

/// Native function implementation
pub type NativeFn = fn(&CallContext<'_>, &[Value]) -> NativeResult;

/// Failure raised by a native function
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    #[error("{0}")]
    Failure(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl NativeError {
    pub fn failure(message: impl Into<String>) -> Self {
        NativeError::Failure(message.into())
    }
}

/// A function exported by a native module
#[derive(Clone)]
pub struct NativeFunction {
    /// Function name
    pub name: &'static str,

    /// Signature shown by completion, e.g. `split(text, separator)`
    pub signature: &'static str,

    /// One line description
    pub description: &'static str,

    /// Minimum number of arguments
    pub min_args: usize,

    /// Maximum number of arguments
    pub max_args: usize,

    /// Implementation
    pub call: NativeFn,
}

impl NativeFunction {
    pub const fn new(
        name: &'static str,
        signature: &'static str,
        description: &'static str,
        min_args: usize,
        max_args: usize,
        call: NativeFn,
    ) -> Self {
        Self {
            name,
            signature,
            description,
            min_args,
            max_args,
            call,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&count)
    }

    /// Human readable arity, e.g. `2` or `2 to 3`
    pub fn arity(&self) -> String {
        if self.min_args == self.max_args {
            self.min_args.to_string()
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        }
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

/// A named group of native functions, imported with `use <name>;`
#[derive(Debug, Clone)]
pub struct NativeModule {
    /// Module name
    pub name: &'static str,

    /// One line description
    pub description: &'static str,

    /// Exported functions
    pub functions: Vec<NativeFunction>,
}

impl NativeModule {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            functions: Vec::new(),
        }
    }

    /// Add a function, replacing any existing one with the same name
    pub fn with(mut self, function: NativeFunction) -> Self {
        self.functions.retain(|f| f.name != function.name);
        self.functions.push(function);
        self
    }

    pub fn function(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Log level for script originated messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Services the embedding application provides to running scripts
pub trait ScriptHost: Send + Sync {
    /// Raw configuration value
    fn config_value(&self, _key: &str) -> Option<Value> {
        None
    }

    fn config_string(&self, key: &str) -> Option<String> {
        match self.config_value(key)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn config_int(&self, key: &str) -> Option<i64> {
        match self.config_value(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    fn config_bool(&self, key: &str) -> Option<bool> {
        match self.config_value(key)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "quarry_script", "{}", message),
            LogLevel::Info => tracing::info!(target: "quarry_script", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "quarry_script", "{}", message),
            LogLevel::Error => tracing::error!(target: "quarry_script", "{}", message),
        }
    }

    /// Whether the running operation has been cancelled
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Host with no configuration that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl ScriptHost for NullHost {}

/// Context handed to native functions
pub struct CallContext<'a> {
    pub host: &'a dyn ScriptHost,
}

impl<'a> CallContext<'a> {
    pub fn new(host: &'a dyn ScriptHost) -> Self {
        Self { host }
    }

    pub fn check_cancelled(&self) -> Result<(), NativeError> {
        if self.host.is_cancelled() {
            Err(NativeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A method the host calls on connector instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub required: bool,
    pub description: &'static str,
}

/// Members a concrete connector declaration must (or may) provide
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractShape {
    /// Properties every concrete connector must declare
    pub required_properties: Vec<&'static str>,

    /// Properties the host reads when present
    pub optional_properties: Vec<&'static str>,

    /// Methods the host calls
    pub methods: Vec<MethodShape>,
}

impl ContractShape {
    pub fn method(&self, name: &str) -> Option<&MethodShape> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn required_methods(&self) -> impl Iterator<Item = &MethodShape> {
        self.methods.iter().filter(|m| m.required)
    }
}

/// Allow-list of modules a script may use
#[derive(Debug, Clone, Default)]
pub struct ReferenceSurface {
    modules: Vec<NativeModule>,
    contract: ContractShape,
}

impl ReferenceSurface {
    /// Module whose functions are callable without a prefix or `use`
    pub const CORE: &'static str = "core";

    /// The built-in modules: core, collections, task, json, ui and http
    pub fn standard() -> Self {
        Self::default()
            .with_module(modules::builtins::module())
            .with_module(modules::collections::module())
            .with_module(modules::task::module())
            .with_module(modules::json::module())
            .with_module(modules::ui::module())
            .with_module(modules::http::module())
    }

    /// Add a module, replacing any module with the same name
    pub fn with_module(mut self, module: NativeModule) -> Self {
        self.modules.retain(|m| m.name != module.name);
        self.modules.push(module);
        self
    }

    pub fn with_contract(mut self, contract: ContractShape) -> Self {
        self.contract = contract;
        self
    }

    pub fn module(&self, name: &str) -> Option<&NativeModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &NativeModule> {
        self.modules.iter()
    }

    /// Function of the implicit core module
    pub fn core_function(&self, name: &str) -> Option<&NativeFunction> {
        self.module(Self::CORE)?.function(name)
    }

    pub fn contract(&self) -> &ContractShape {
        &self.contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MapHost(serde_json::Map<String, Value>);

    impl ScriptHost for MapHost {
        fn config_value(&self, key: &str) -> Option<Value> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn test_standard_surface_modules() {
        let surface = ReferenceSurface::standard();
        for name in ["core", "collections", "task", "json", "ui", "http"] {
            assert!(surface.module(name).is_some(), "missing {}", name);
        }
        assert!(surface.module("fs").is_none());
        assert!(surface.core_function("len").is_some());
    }

    #[test]
    fn test_with_module_replaces_by_name() {
        let surface = ReferenceSurface::standard()
            .with_module(NativeModule::new("json", "replacement"));
        assert_eq!(surface.modules().filter(|m| m.name == "json").count(), 1);
        assert_eq!(surface.module("json").unwrap().description, "replacement");
    }

    #[test]
    fn test_host_conversions() {
        let host = MapHost(
            json!({"limit": "25", "verbose": "yes", "depth": 3, "name": "docs"})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(host.config_int("limit"), Some(25));
        assert_eq!(host.config_bool("verbose"), Some(true));
        assert_eq!(host.config_string("depth").as_deref(), Some("3"));
        assert_eq!(host.config_string("name").as_deref(), Some("docs"));
        assert_eq!(host.config_int("missing"), None);
    }
}
