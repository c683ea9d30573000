//! `core`: primitives callable without a module prefix

use serde_json::{Map, Value};

use super::{arg, count_arg, fail, int_arg, list_arg, map_arg, num_arg, str_arg};
use crate::surface::{CallContext, NativeError, NativeFunction, NativeModule, NativeResult};
use crate::value::{self, compare, display, equals, float, type_name, Num};

/// Largest list `range` will build
const MAX_RANGE: i64 = 1_000_000;

pub fn module() -> NativeModule {
    NativeModule::new("core", "Core primitives, always available")
        .with(NativeFunction::new("len", "len(value)", "Length of a string, list or map", 1, 1, len))
        .with(NativeFunction::new("to_string", "to_string(value)", "Text form of a value", 1, 1, to_string))
        .with(NativeFunction::new("to_int", "to_int(value)", "Convert to an integer, null when not convertible", 1, 1, to_int))
        .with(NativeFunction::new("to_float", "to_float(value)", "Convert to a float, null when not convertible", 1, 1, to_float))
        .with(NativeFunction::new("type_of", "type_of(value)", "Type name of a value", 1, 1, type_of))
        .with(NativeFunction::new("lower", "lower(text)", "Lowercase text", 1, 1, lower))
        .with(NativeFunction::new("upper", "upper(text)", "Uppercase text", 1, 1, upper))
        .with(NativeFunction::new("trim", "trim(text)", "Strip surrounding whitespace", 1, 1, trim))
        .with(NativeFunction::new("contains", "contains(haystack, needle)", "Substring, list element or map key test", 2, 2, contains))
        .with(NativeFunction::new("starts_with", "starts_with(text, prefix)", "Prefix test", 2, 2, starts_with))
        .with(NativeFunction::new("ends_with", "ends_with(text, suffix)", "Suffix test", 2, 2, ends_with))
        .with(NativeFunction::new("split", "split(text, separator)", "Split text into a list", 2, 2, split))
        .with(NativeFunction::new("join", "join(list, separator)", "Join list elements into text", 2, 2, join))
        .with(NativeFunction::new("replace", "replace(text, from, to)", "Replace every occurrence", 3, 3, replace))
        .with(NativeFunction::new("push", "push(list, value)", "Copy of a list with a value appended", 2, 2, push))
        .with(NativeFunction::new("keys", "keys(map)", "Keys of a map", 1, 1, keys))
        .with(NativeFunction::new("values", "values(map)", "Values of a map", 1, 1, values))
        .with(NativeFunction::new("range", "range(start, end)", "Integers from start (default 0) up to end", 1, 2, range))
        .with(NativeFunction::new("min", "min(a, b)", "Smaller of two values, or the smallest list element", 1, 2, min))
        .with(NativeFunction::new("max", "max(a, b)", "Larger of two values, or the largest list element", 1, 2, max))
        .with(NativeFunction::new("abs", "abs(number)", "Absolute value", 1, 1, abs))
        .with(NativeFunction::new("round", "round(number)", "Round to the nearest integer", 1, 1, round))
        .with(NativeFunction::new("substring", "substring(text, start, end)", "Characters from start up to end", 2, 3, substring))
        .with(NativeFunction::new("index_of", "index_of(haystack, needle)", "Position of needle, or -1", 2, 2, index_of))
        .with(NativeFunction::new("get", "get(collection, key, default)", "Element or key lookup with a default", 2, 3, get))
        .with(NativeFunction::new("set", "set(collection, key, value)", "Copy of a map or list with one entry replaced", 3, 3, set))
}

fn len(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let n = match arg(args, 0) {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(NativeError::failure(format!(
                "len: {} has no length",
                type_name(other)
            )))
        }
    };
    Ok(Value::from(n))
}

fn to_string(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(Value::String(display(arg(args, 0))))
}

fn to_int(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let converted = match arg(args, 0) {
        Value::Number(_) => match Num::of(arg(args, 0)) {
            Some(Num::Int(i)) => Some(i),
            Some(Num::Float(f)) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    };
    Ok(converted.map(Value::from).unwrap_or(Value::Null))
}

fn to_float(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let converted = match arg(args, 0) {
        Value::Number(_) => Num::of(arg(args, 0)).map(Num::as_f64),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match converted.filter(|f| f.is_finite()) {
        Some(f) => float(f).map_err(fail("to_float")),
        None => Ok(Value::Null),
    }
}

fn type_of(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(Value::from(type_name(arg(args, 0))))
}

fn lower(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(Value::from(str_arg("lower", args, 0)?.to_lowercase()))
}

fn upper(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(Value::from(str_arg("upper", args, 0)?.to_uppercase()))
}

fn trim(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    Ok(Value::from(str_arg("trim", args, 0)?.trim()))
}

fn contains(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let needle = arg(args, 1);
    let found = match arg(args, 0) {
        Value::String(s) => s.contains(str_arg("contains", args, 1)?),
        Value::Array(items) => items.iter().any(|item| equals(item, needle)),
        Value::Object(map) => map.contains_key(str_arg("contains", args, 1)?),
        Value::Null => false,
        other => {
            return Err(NativeError::failure(format!(
                "contains: cannot search {}",
                type_name(other)
            )))
        }
    };
    Ok(Value::Bool(found))
}

fn starts_with(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("starts_with", args, 0)?;
    Ok(Value::Bool(text.starts_with(str_arg("starts_with", args, 1)?)))
}

fn ends_with(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("ends_with", args, 0)?;
    Ok(Value::Bool(text.ends_with(str_arg("ends_with", args, 1)?)))
}

fn split(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("split", args, 0)?;
    let separator = str_arg("split", args, 1)?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        text.split(separator).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

fn join(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("join", args, 0)?;
    let separator = str_arg("join", args, 1)?;
    let parts: Vec<String> = items.iter().map(display).collect();
    Ok(Value::from(parts.join(separator)))
}

fn replace(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("replace", args, 0)?;
    let from = str_arg("replace", args, 1)?;
    let to = str_arg("replace", args, 2)?;
    if from.is_empty() {
        return Ok(Value::from(text));
    }
    Ok(Value::from(text.replace(from, to)))
}

fn push(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let mut items = list_arg("push", args, 0)?.clone();
    items.push(arg(args, 1).clone());
    Ok(Value::Array(items))
}

fn keys(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let map = map_arg("keys", args, 0)?;
    Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
}

fn values(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let map = map_arg("values", args, 0)?;
    Ok(Value::Array(map.values().cloned().collect()))
}

fn range(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let (start, end) = if args.len() == 2 {
        (int_arg("range", args, 0)?, int_arg("range", args, 1)?)
    } else {
        (0, int_arg("range", args, 0)?)
    };
    if end.saturating_sub(start) > MAX_RANGE {
        return Err(NativeError::failure(format!(
            "range: more than {} elements requested",
            MAX_RANGE
        )));
    }
    Ok(Value::Array((start..end).map(Value::from).collect()))
}

fn extreme(name: &str, args: &[Value], keep: std::cmp::Ordering) -> NativeResult {
    let candidates: Vec<&Value> = if args.len() == 1 {
        list_arg(name, args, 0)?.iter().collect()
    } else {
        args.iter().collect()
    };
    let mut best: Option<&Value> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => match compare(candidate, current) {
                Some(ordering) if ordering == keep => Some(candidate),
                Some(_) => Some(current),
                None => {
                    return Err(NativeError::failure(format!(
                        "{}: cannot compare {} with {}",
                        name,
                        type_name(candidate),
                        type_name(current)
                    )))
                }
            },
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn min(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    extreme("min", args, std::cmp::Ordering::Less)
}

fn max(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    extreme("max", args, std::cmp::Ordering::Greater)
}

fn abs(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    match num_arg("abs", args, 0)? {
        Num::Int(i) => i
            .checked_abs()
            .map(Value::from)
            .ok_or_else(|| NativeError::failure("abs: integer overflow")),
        Num::Float(f) => float(f.abs()).map_err(fail("abs")),
    }
}

fn round(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    match num_arg("round", args, 0)? {
        Num::Int(i) => Ok(Value::from(i)),
        Num::Float(f) => {
            let rounded = f.round();
            if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
                Ok(Value::from(rounded as i64))
            } else {
                Err(NativeError::failure("round: value out of integer range"))
            }
        }
    }
}

fn substring(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let text = str_arg("substring", args, 0)?;
    let start = count_arg("substring", args, 1)?;
    let end = if args.len() > 2 {
        count_arg("substring", args, 2)?
    } else {
        usize::MAX
    };
    let result: String = text
        .chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    Ok(Value::from(result))
}

fn index_of(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let position = match arg(args, 0) {
        Value::String(s) => {
            let needle = str_arg("index_of", args, 1)?;
            s.find(needle).map(|byte| s[..byte].chars().count())
        }
        Value::Array(items) => items.iter().position(|item| equals(item, arg(args, 1))),
        other => {
            return Err(NativeError::failure(format!(
                "index_of: cannot search {}",
                type_name(other)
            )))
        }
    };
    Ok(position.map_or(Value::from(-1), Value::from))
}

fn get(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let found = value::index(arg(args, 0), arg(args, 1)).map_err(fail("get"))?;
    if found.is_null() {
        Ok(arg(args, 2).clone())
    } else {
        Ok(found)
    }
}

fn set(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    match arg(args, 0) {
        Value::Object(map) => {
            let mut map: Map<String, Value> = map.clone();
            map.insert(str_arg("set", args, 1)?.to_string(), arg(args, 2).clone());
            Ok(Value::Object(map))
        }
        Value::Array(items) => {
            let position = count_arg("set", args, 1)?;
            let mut items = items.clone();
            match items.get_mut(position) {
                Some(slot) => *slot = arg(args, 2).clone(),
                None => {
                    return Err(NativeError::failure(format!(
                        "set: index {} out of range for list of length {}",
                        position,
                        items.len()
                    )))
                }
            }
            Ok(Value::Array(items))
        }
        other => Err(NativeError::failure(format!(
            "set: cannot update {}",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NullHost;
    use rstest::rstest;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>) -> NativeResult {
        let module = module();
        let function = module.function(name).unwrap();
        assert!(function.accepts(args.len()));
        (function.call)(&CallContext::new(&NullHost), &args)
    }

    #[rstest]
    #[case("len", vec![json!("héllo")], json!(5))]
    #[case("len", vec![json!([1, 2])], json!(2))]
    #[case("to_int", vec![json!(" 42 ")], json!(42))]
    #[case("to_int", vec![json!("abc")], json!(null))]
    #[case("to_int", vec![json!(3.9)], json!(3))]
    #[case("to_string", vec![json!([1])], json!("[1]"))]
    #[case("type_of", vec![json!(1.5)], json!("float"))]
    #[case("contains", vec![json!("Readme.md"), json!("read")], json!(false))]
    #[case("contains", vec![json!([1, 2]), json!(2.0)], json!(true))]
    #[case("split", vec![json!("a,b"), json!(",")], json!(["a", "b"]))]
    #[case("join", vec![json!(["a", 1]), json!("-")], json!("a-1"))]
    #[case("range", vec![json!(3)], json!([0, 1, 2]))]
    #[case("range", vec![json!(2), json!(4)], json!([2, 3]))]
    #[case("min", vec![json!(3), json!(1)], json!(1))]
    #[case("max", vec![json!([3, 7, 5])], json!(7))]
    #[case("round", vec![json!(2.5)], json!(3))]
    #[case("substring", vec![json!("quarry"), json!(1), json!(3)], json!("ua"))]
    #[case("index_of", vec![json!("héllo"), json!("l")], json!(2))]
    #[case("get", vec![json!({"a": 1}), json!("b"), json!(0)], json!(0))]
    #[case("set", vec![json!({"a": 1}), json!("b"), json!(2)], json!({"a": 1, "b": 2}))]
    #[case("push", vec![json!([1]), json!(2)], json!([1, 2]))]
    fn test_core_functions(#[case] name: &str, #[case] args: Vec<Value>, #[case] expected: Value) {
        assert_eq!(call(name, args).unwrap(), expected);
    }

    #[test]
    fn test_type_errors_are_reported() {
        let err = call("lower", vec![json!(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "lower: argument 1 must be a string, found int"
        );
        assert!(call("range", vec![json!(0), json!(10_000_000)]).is_err());
        assert!(call("set", vec![json!([1]), json!(5), json!(0)]).is_err());
    }
}
