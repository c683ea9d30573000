//! `json`: parse and serialise JSON text

use serde_json::Value;

use super::{arg, str_arg};
use crate::surface::{CallContext, NativeError, NativeFunction, NativeModule, NativeResult};

pub fn module() -> NativeModule {
    NativeModule::new("json", "JSON parsing and serialisation")
        .with(NativeFunction::new("parse", "parse(text)", "Parse JSON text into a value", 1, 1, parse))
        .with(NativeFunction::new("stringify", "stringify(value)", "Compact JSON text", 1, 1, stringify))
        .with(NativeFunction::new("pretty", "pretty(value)", "Indented JSON text", 1, 1, pretty))
}

fn parse(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("parse", args, 0)?;
    serde_json::from_str(text).map_err(|e| NativeError::failure(format!("parse: {}", e)))
}

fn stringify(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    serde_json::to_string(arg(args, 0))
        .map(Value::String)
        .map_err(|e| NativeError::failure(format!("stringify: {}", e)))
}

fn pretty(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    serde_json::to_string_pretty(arg(args, 0))
        .map(Value::String)
        .map_err(|e| NativeError::failure(format!("pretty: {}", e)))
}
