//! `collections`: list helpers

use std::cmp::Ordering;

use serde_json::Value;

use super::{arg, count_arg, list_arg, str_arg};
use crate::surface::{CallContext, NativeError, NativeFunction, NativeModule, NativeResult};
use crate::value::{compare, equals, is_truthy, type_name};

pub fn module() -> NativeModule {
    NativeModule::new("collections", "List manipulation")
        .with(NativeFunction::new("take", "take(list, count)", "First count elements", 2, 2, take))
        .with(NativeFunction::new("skip", "skip(list, count)", "Elements after the first count", 2, 2, skip))
        .with(NativeFunction::new("sort", "sort(list)", "Sorted copy of a list of numbers or strings", 1, 1, sort))
        .with(NativeFunction::new("sort_by", "sort_by(list, key, descending)", "Sort a list of maps by one key", 2, 3, sort_by))
        .with(NativeFunction::new("reverse", "reverse(list)", "Reversed copy of a list or string", 1, 1, reverse))
        .with(NativeFunction::new("unique", "unique(list)", "Copy without repeated elements, first occurrence wins", 1, 1, unique))
        .with(NativeFunction::new("concat", "concat(a, b)", "Concatenate two lists", 2, 2, concat))
        .with(NativeFunction::new("flatten", "flatten(list)", "Flatten one level of nested lists", 1, 1, flatten))
        .with(NativeFunction::new("first", "first(list)", "First element, or null", 1, 1, first))
        .with(NativeFunction::new("last", "last(list)", "Last element, or null", 1, 1, last))
}

fn take(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("take", args, 0)?;
    let count = count_arg("take", args, 1)?;
    Ok(Value::Array(items.iter().take(count).cloned().collect()))
}

fn skip(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("skip", args, 0)?;
    let count = count_arg("skip", args, 1)?;
    Ok(Value::Array(items.iter().skip(count).cloned().collect()))
}

/// Stable sort that fails on the first pair of incomparable values
fn sorted_by_key(
    name: &str,
    items: &[Value],
    key: impl Fn(&Value) -> Value,
) -> Result<Vec<Value>, NativeError> {
    let mut keyed: Vec<(Value, Value)> = items.iter().map(|v| (key(v), v.clone())).collect();
    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => compare(a, b).unwrap_or_else(|| {
            failure.get_or_insert_with(|| {
                format!(
                    "{}: cannot compare {} with {}",
                    name,
                    type_name(a),
                    type_name(b)
                )
            });
            Ordering::Equal
        }),
    });
    match failure {
        Some(message) => Err(NativeError::Failure(message)),
        None => Ok(keyed.into_iter().map(|(_, v)| v).collect()),
    }
}

fn sort(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("sort", args, 0)?;
    sorted_by_key("sort", items, Value::clone).map(Value::Array)
}

fn sort_by(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("sort_by", args, 0)?;
    let key = str_arg("sort_by", args, 1)?;
    let mut sorted = sorted_by_key("sort_by", items, |item| {
        item.get(key).cloned().unwrap_or(Value::Null)
    })?;
    if is_truthy(arg(args, 2)) {
        sorted.reverse();
    }
    Ok(Value::Array(sorted))
}

fn reverse(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    match arg(args, 0) {
        Value::String(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
        _ => {
            let items = list_arg("reverse", args, 0)?;
            Ok(Value::Array(items.iter().rev().cloned().collect()))
        }
    }
}

fn unique(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("unique", args, 0)?;
    let mut seen: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.iter().any(|s| equals(s, item)) {
            seen.push(item.clone());
        }
    }
    Ok(Value::Array(seen))
}

fn concat(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let a = list_arg("concat", args, 0)?;
    let b = list_arg("concat", args, 1)?;
    Ok(Value::Array(a.iter().chain(b).cloned().collect()))
}

fn flatten(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("flatten", args, 0)?;
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) => flat.extend(inner.iter().cloned()),
            other => flat.push(other.clone()),
        }
    }
    Ok(Value::Array(flat))
}

fn first(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("first", args, 0)?;
    Ok(items.first().cloned().unwrap_or(Value::Null))
}

fn last(_: &CallContext<'_>, args: &[Value]) -> NativeResult {
    let items = list_arg("last", args, 0)?;
    Ok(items.last().cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NullHost;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>) -> NativeResult {
        let module = module();
        (module.function(name).unwrap().call)(&CallContext::new(&NullHost), &args)
    }

    #[test]
    fn test_take_and_skip() {
        assert_eq!(call("take", vec![json!([1, 2, 3]), json!(2)]).unwrap(), json!([1, 2]));
        assert_eq!(call("skip", vec![json!([1, 2, 3]), json!(5)]).unwrap(), json!([]));
        assert!(call("take", vec![json!([1]), json!(-1)]).is_err());
    }

    #[test]
    fn test_sort_by_key_puts_missing_last() {
        let items = json!([{"n": "b", "s": 2}, {"n": "c"}, {"n": "a", "s": 1}]);
        let sorted = call("sort_by", vec![items, json!("s")]).unwrap();
        assert_eq!(sorted, json!([{"n": "a", "s": 1}, {"n": "b", "s": 2}, {"n": "c"}]));
    }

    #[test]
    fn test_sort_rejects_mixed_types() {
        assert_eq!(call("sort", vec![json!([3, 1, 2])]).unwrap(), json!([1, 2, 3]));
        assert!(call("sort", vec![json!([1, "a"])]).is_err());
    }

    #[test]
    fn test_shape_helpers() {
        assert_eq!(call("unique", vec![json!([1, 1.0, 2, 1])]).unwrap(), json!([1, 2]));
        assert_eq!(call("flatten", vec![json!([[1], 2, [3, [4]]])]).unwrap(), json!([1, 2, 3, [4]]));
        assert_eq!(call("reverse", vec![json!("abc")]).unwrap(), json!("cba"));
        assert_eq!(call("first", vec![json!([])]).unwrap(), Value::Null);
        assert_eq!(call("last", vec![json!([1, 2])]).unwrap(), json!(2));
    }
}
