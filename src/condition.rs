//! Conditional response selection.

use crate::context::{lookup, value_to_string};
use crate::mock::{Condition, Mock, Operator};
use serde_json::Value;
use tracing::debug;

/// Pick the body to answer with: the response of the first condition that
/// holds, or the mock's default `response_content`.
pub fn evaluate<'a>(mock: &'a Mock, context: &Value) -> &'a Value {
    let Some(conditions) = &mock.conditions else {
        return &mock.response_content;
    };

    match conditions.iter().position(|c| condition_holds(c, context)) {
        Some(index) => {
            debug!(mock_id = %mock.id, condition = index, "Condition matched");
            &conditions[index].response
        }
        None => &mock.response_content,
    }
}

/// Test a single condition against the context. Never fails.
pub fn condition_holds(condition: &Condition, context: &Value) -> bool {
    let actual = lookup(context, &condition.field);
    let expected = condition.value.as_ref();

    match &condition.operator {
        Operator::Equals => strict_eq(actual, expected),
        Operator::NotEquals => !strict_eq(actual, expected),
        Operator::Contains => match (actual.filter(|v| !is_falsy(v)), expected) {
            (Some(haystack), Some(needle)) => {
                match (value_to_string(haystack), value_to_string(needle)) {
                    (Some(haystack), Some(needle)) => haystack.contains(&needle),
                    _ => false,
                }
            }
            _ => false,
        },
        Operator::Exists => actual.is_some_and(|v| !v.is_null()),
        Operator::GreaterThan => compare(actual, expected, |a, b| a > b),
        Operator::LessThan => compare(actual, expected, |a, b| a < b),
        Operator::Unknown(op) => {
            debug!(operator = %op, "Unknown condition operator");
            false
        }
    }
}

/// Values that never contain anything: null, `false`, `0` and `""`.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn strict_eq(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (a, b) => a == b,
    }
}

fn compare(actual: Option<&Value>, expected: Option<&Value>, op: fn(f64, f64) -> bool) -> bool {
    match (to_number(actual), to_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Numeric coercion. `None` stands for "not a number".
///
/// Strings follow number-literal rules: surrounding whitespace is ignored,
/// an empty string is zero, `0x`/`0o`/`0b` prefixes select a radix and
/// `Infinity` is accepted. Arrays coerce through their comma-joined text, so
/// `[]` is zero and `[5]` is five.
fn to_number(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    let number = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        Value::Array(_) => parse_number(&joined_text(value))?,
        Value::Object(_) => return None,
    };
    (!number.is_nan()).then_some(number)
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
    }

    match trimmed {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        // Rust also accepts "inf" and "nan", which are not number literals.
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => None,
        _ => trimmed.parse().ok(),
    }
}

/// Text of a value as used for array coercion: nulls are empty and array
/// elements are joined with commas.
fn joined_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(joined_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
