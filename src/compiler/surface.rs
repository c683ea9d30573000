//! The host side of the reference surface: the `host` module and the
//! connector contract scripts are checked against

use serde_json::Value;

use quarry_script::value::display;
use quarry_script::{
    CallContext, ContractShape, LogLevel, MethodShape, NativeError, NativeFunction, NativeModule,
    NativeResult, ReferenceSurface,
};

/// Name scripts import the host module under
pub const HOST_MODULE: &str = "host";

/// Reference surface every connector script is compiled against
pub fn reference_surface() -> ReferenceSurface {
    ReferenceSurface::standard()
        .with_module(host_module())
        .with_contract(contract())
}

/// Members of the connector contract as seen from scripts
pub fn contract() -> ContractShape {
    ContractShape {
        required_properties: vec!["id", "name"],
        optional_properties: vec!["description", "version", "icon", "parameters"],
        methods: vec![
            MethodShape {
                name: "search",
                params: &["query", "max_results"],
                required: true,
                description: "Return a list of result maps for a query",
            },
            MethodShape {
                name: "initialize",
                params: &["config"],
                required: false,
                description: "Receive configuration, return false to reject it",
            },
            MethodShape {
                name: "test_connection",
                params: &[],
                required: false,
                description: "Check that the data source is reachable",
            },
            MethodShape {
                name: "detail_view",
                params: &[],
                required: false,
                description: "Describe the default detail view layout",
            },
            MethodShape {
                name: "custom_view",
                params: &["result"],
                required: false,
                description: "Build a custom detail view with the ui module",
            },
            MethodShape {
                name: "execute_action",
                params: &["action", "result"],
                required: false,
                description: "Handle a result action, return true when handled",
            },
            MethodShape {
                name: "dispose",
                params: &[],
                required: false,
                description: "Release resources",
            },
        ],
    }
}

/// The `host` module: configuration access and logging
pub fn host_module() -> NativeModule {
    NativeModule::new(HOST_MODULE, "Connector configuration and logging")
        .with(NativeFunction::new("config", "config(key)", "Raw configuration value, or null", 1, 1, config))
        .with(NativeFunction::new("config_string", "config_string(key, default)", "Configuration value as text", 1, 2, config_string))
        .with(NativeFunction::new("config_int", "config_int(key, default)", "Configuration value as an integer", 1, 2, config_int))
        .with(NativeFunction::new("config_bool", "config_bool(key, default)", "Configuration value as a boolean", 1, 2, config_bool))
        .with(NativeFunction::new("log_debug", "log_debug(message)", "Log at debug level", 1, 1, log_debug))
        .with(NativeFunction::new("log_info", "log_info(message)", "Log at info level", 1, 1, log_info))
        .with(NativeFunction::new("log_warning", "log_warning(message)", "Log at warning level", 1, 1, log_warning))
        .with(NativeFunction::new("log_error", "log_error(message)", "Log at error level", 1, 1, log_error))
}

fn key<'a>(function: &str, args: &'a [Value]) -> Result<&'a str, NativeError> {
    match args.first() {
        Some(Value::String(key)) => Ok(key),
        _ => Err(NativeError::failure(format!(
            "{}: the key must be a string",
            function
        ))),
    }
}

fn fallback(args: &[Value]) -> Value {
    args.get(1).cloned().unwrap_or(Value::Null)
}

fn config(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(ctx.host.config_value(key("config", args)?).unwrap_or(Value::Null))
}

fn config_string(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(ctx
        .host
        .config_string(key("config_string", args)?)
        .map(Value::String)
        .unwrap_or_else(|| fallback(args)))
}

fn config_int(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(ctx
        .host
        .config_int(key("config_int", args)?)
        .map(Value::from)
        .unwrap_or_else(|| fallback(args)))
}

fn config_bool(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(ctx
        .host
        .config_bool(key("config_bool", args)?)
        .map(Value::Bool)
        .unwrap_or_else(|| fallback(args)))
}

fn log(ctx: &CallContext<'_>, level: LogLevel, args: &[Value]) -> NativeResult {
    let message = args.first().map(display).unwrap_or_default();
    ctx.host.log(level, &message);
    Ok(Value::Null)
}

fn log_debug(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    log(ctx, LogLevel::Debug, args)
}

fn log_info(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    log(ctx, LogLevel::Info, args)
}

fn log_warning(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    log(ctx, LogLevel::Warning, args)
}

fn log_error(ctx: &CallContext<'_>, args: &[Value]) -> NativeResult {
    log(ctx, LogLevel::Error, args)
}
