//! Built-in native modules

pub mod builtins;
pub mod collections;
pub mod http;
pub mod json;
pub mod task;
pub mod ui;

use serde_json::{Map, Value};

use crate::surface::NativeError;
use crate::value::{type_name, Num};

fn mismatch(function: &str, position: usize, expected: &str, found: &Value) -> NativeError {
    NativeError::failure(format!(
        "{}: argument {} must be {}, found {}",
        function,
        position + 1,
        expected,
        type_name(found)
    ))
}

/// Argument `position`, or `null` when omitted
pub fn arg(args: &[Value], position: usize) -> &Value {
    args.get(position).unwrap_or(&Value::Null)
}

pub fn str_arg<'a>(function: &str, args: &'a [Value], position: usize) -> Result<&'a str, NativeError> {
    match arg(args, position) {
        Value::String(s) => Ok(s),
        other => Err(mismatch(function, position, "a string", other)),
    }
}

pub fn int_arg(function: &str, args: &[Value], position: usize) -> Result<i64, NativeError> {
    match Num::of(arg(args, position)) {
        Some(Num::Int(i)) => Ok(i),
        _ => Err(mismatch(function, position, "an integer", arg(args, position))),
    }
}

pub fn num_arg(function: &str, args: &[Value], position: usize) -> Result<Num, NativeError> {
    Num::of(arg(args, position))
        .ok_or_else(|| mismatch(function, position, "a number", arg(args, position)))
}

pub fn list_arg<'a>(function: &str, args: &'a [Value], position: usize) -> Result<&'a Vec<Value>, NativeError> {
    match arg(args, position) {
        Value::Array(items) => Ok(items),
        other => Err(mismatch(function, position, "a list", other)),
    }
}

pub fn map_arg<'a>(
    function: &str,
    args: &'a [Value],
    position: usize,
) -> Result<&'a Map<String, Value>, NativeError> {
    match arg(args, position) {
        Value::Object(map) => Ok(map),
        other => Err(mismatch(function, position, "a map", other)),
    }
}

/// Non-negative count argument, clamped to `usize`
pub fn count_arg(function: &str, args: &[Value], position: usize) -> Result<usize, NativeError> {
    let n = int_arg(function, args, position)?;
    usize::try_from(n).map_err(|_| {
        NativeError::failure(format!(
            "{}: argument {} must not be negative",
            function,
            position + 1
        ))
    })
}

/// Convert a value-level error message into a native failure
pub(crate) fn fail(function: &str) -> impl Fn(String) -> NativeError + '_ {
    move |message| NativeError::failure(format!("{}: {}", function, message))
}
