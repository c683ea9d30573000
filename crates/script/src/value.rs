//! Operations on script values
//!
//! Script values are plain JSON values. Integers stay integers until mixed
//! with a float.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::ast::BinaryOp;

/// Numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn of(value: &Value) -> Option<Num> {
        let Value::Number(n) = value else {
            return None;
        };
        match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Result<Value, String> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => float(f),
        }
    }
}

/// Float value, rejecting NaN and infinities
pub fn float(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "Result is not a finite number".to_string())
}

/// Only `false` and `null` are falsy
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Text form used by string concatenation and `to_string`
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Structural equality where `1 == 1.0`
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(_)) => match (Num::of(lhs), Num::of(rhs)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => lhs == rhs,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map_or(false, |y| equals(x, y)))
        }
        _ => lhs == rhs,
    }
}

/// Ordering for numbers and strings; `None` for anything else
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(_), Value::Number(_)) => match (Num::of(lhs)?, Num::of(rhs)?) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluate a non short-circuiting binary operator
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(equals(lhs, rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!equals(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(lhs, rhs).ok_or_else(|| {
                format!(
                    "Cannot compare {} with {}",
                    type_name(lhs),
                    type_name(rhs)
                )
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And => Ok(Value::Bool(is_truthy(lhs) && is_truthy(rhs))),
        BinaryOp::Or => Ok(Value::Bool(is_truthy(lhs) || is_truthy(rhs))),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match (lhs, rhs) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::String(display(lhs) + &display(rhs)))
        }
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        _ => arithmetic(BinaryOp::Add, lhs, rhs),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    let (a, b) = match (Num::of(lhs), Num::of(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(format!(
                "Operator '{}' cannot be applied to {} and {}",
                op.symbol(),
                type_name(lhs),
                type_name(rhs)
            ))
        }
    };

    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                    return Err("Division by zero".to_string())
                }
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result
                .map(Value::from)
                .ok_or_else(|| "Integer overflow".to_string())
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
                    return Err("Division by zero".to_string())
                }
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            float(result)
        }
    }
}

/// `-value`
pub fn negate(value: &Value) -> Result<Value, String> {
    match Num::of(value) {
        Some(Num::Int(i)) => i
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| "Integer overflow".to_string()),
        Some(Num::Float(f)) => float(-f),
        None => Err(format!("Cannot negate {}", type_name(value))),
    }
}

/// `object[index]`; out of range or missing keys yield `null`
pub fn index(object: &Value, index: &Value) -> Result<Value, String> {
    match (object, index) {
        (Value::Array(items), Value::Number(_)) => {
            let Some(Num::Int(i)) = Num::of(index) else {
                return Err("List index must be an integer".to_string());
            };
            let position = if i < 0 { items.len() as i64 + i } else { i };
            Ok(usize::try_from(position)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::String(s), Value::Number(_)) => {
            let Some(Num::Int(i)) = Num::of(index) else {
                return Err("String index must be an integer".to_string());
            };
            Ok(usize::try_from(i)
                .ok()
                .and_then(|p| s.chars().nth(p))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        _ => Err(format!(
            "Cannot index {} with {}",
            type_name(object),
            type_name(index)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(null), false)]
    #[case(json!(false), false)]
    #[case(json!(0), true)]
    #[case(json!(""), true)]
    #[case(json!([]), true)]
    fn test_truthiness(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_truthy(&value), expected);
    }

    #[rstest]
    #[case(BinaryOp::Add, json!(2), json!(3), json!(5))]
    #[case(BinaryOp::Add, json!("n="), json!(3), json!("n=3"))]
    #[case(BinaryOp::Add, json!([1]), json!([2]), json!([1, 2]))]
    #[case(BinaryOp::Div, json!(7), json!(2), json!(3))]
    #[case(BinaryOp::Div, json!(7.0), json!(2), json!(3.5))]
    #[case(BinaryOp::Rem, json!(7), json!(3), json!(1))]
    #[case(BinaryOp::Eq, json!(1), json!(1.0), json!(true))]
    #[case(BinaryOp::Lt, json!("a"), json!("b"), json!(true))]
    fn test_binary(#[case] op: BinaryOp, #[case] lhs: Value, #[case] rhs: Value, #[case] expected: Value) {
        assert_eq!(binary(op, &lhs, &rhs).unwrap(), expected);
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(binary(BinaryOp::Div, &json!(1), &json!(0)).is_err());
        assert!(binary(BinaryOp::Add, &json!(i64::MAX), &json!(1)).is_err());
        assert!(binary(BinaryOp::Sub, &json!("a"), &json!(1)).is_err());
        assert!(binary(BinaryOp::Lt, &json!(1), &json!("a")).is_err());
    }

    #[test]
    fn test_index() {
        let list = json!([10, 20, 30]);
        assert_eq!(index(&list, &json!(1)).unwrap(), json!(20));
        assert_eq!(index(&list, &json!(-1)).unwrap(), json!(30));
        assert_eq!(index(&list, &json!(9)).unwrap(), Value::Null);
        assert_eq!(index(&json!({"a": 1}), &json!("b")).unwrap(), Value::Null);
        assert_eq!(index(&json!("héllo"), &json!(1)).unwrap(), json!("é"));
        assert!(index(&json!(5), &json!(0)).is_err());
    }
}
