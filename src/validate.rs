//! Validation and sanitization of mock definitions supplied over the API.
//!
//! Payloads are checked as raw JSON before deserialization so every problem
//! is reported at once, in a form a client can act on.

use crate::mock::{HttpMethod, Operator};
use serde_json::{Map, Value};

/// Fields that may appear in an update payload.
pub const UPDATABLE_FIELDS: [&str; 11] = [
    "route",
    "method",
    "urlParams",
    "bodyParams",
    "headers",
    "responseHeaders",
    "statusCode",
    "responseContent",
    "contentType",
    "conditions",
    "description",
];

const CONSTRAINT_FIELDS: [&str; 4] = ["urlParams", "bodyParams", "headers", "responseHeaders"];

/// String fields stored exactly as given.
const UNESCAPED_FIELDS: [&str; 2] = ["route", "contentType"];

/// Every problem found in a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation errors: {}", .0.join(", "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    fn check(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }
}

/// Validate a full mock definition.
pub fn validate_mock_data(data: &Value) -> Result<(), ValidationErrors> {
    match data.as_object() {
        Some(fields) => ValidationErrors::check(mock_data_errors(fields)),
        None => Err(ValidationErrors(vec![
            "Mock configuration must be a JSON object".to_string(),
        ])),
    }
}

/// Validate a partial update: only updatable fields, each well-formed.
pub fn validate_mock_update(data: &Value) -> Result<(), ValidationErrors> {
    let Some(fields) = data.as_object() else {
        return Err(ValidationErrors(vec![
            "Update must be a JSON object".to_string(),
        ]));
    };

    let mut errors = Vec::new();
    let invalid: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|key| !UPDATABLE_FIELDS.contains(key))
        .collect();
    if !invalid.is_empty() {
        errors.push(format!("Invalid fields: {}", invalid.join(", ")));
    }

    let mut present: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| UPDATABLE_FIELDS.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if !present.is_empty() {
        present
            .entry("route")
            .or_insert_with(|| Value::String("/dummy".to_string()));
        present
            .entry("method")
            .or_insert_with(|| Value::String("get".to_string()));
        errors.extend(mock_data_errors(&present));
    }

    ValidationErrors::check(errors)
}

fn mock_data_errors(data: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    match data.get("route").and_then(Value::as_str) {
        Some(route) if !route.is_empty() => {
            if !route.starts_with('/') {
                errors.push("Route must start with /".to_string());
            }
        }
        _ => errors.push("Route is required and must be a string".to_string()),
    }

    let method_ok = data
        .get("method")
        .and_then(Value::as_str)
        .is_some_and(|m| m.parse::<HttpMethod>().is_ok());
    if !method_ok {
        errors.push(format!(
            "Method must be one of: {}",
            HttpMethod::ALL.map(|m| m.as_str()).join(", ")
        ));
    }

    if let Some(status) = present(data, "statusCode") {
        let valid = status
            .as_u64()
            .is_some_and(|code| (100..=599).contains(&code));
        if !valid {
            errors.push("Status code must be a valid HTTP status code (100-599)".to_string());
        }
    }

    if present(data, "contentType").is_some_and(|ct| !ct.is_string()) {
        errors.push("Content type must be a string".to_string());
    }

    for field in CONSTRAINT_FIELDS {
        if let Some(value) = present(data, field) {
            let valid = value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string));
            if !valid {
                errors.push(format!("{field} must be an object of string values"));
            }
        }
    }

    match present(data, "conditions") {
        None => {}
        Some(Value::Array(conditions)) => {
            for (index, condition) in conditions.iter().enumerate() {
                let condition_errors = condition_errors(condition);
                if !condition_errors.is_empty() {
                    errors.push(format!("Condition {index}: {}", condition_errors.join(", ")));
                }
            }
        }
        Some(_) => errors.push("Conditions must be an array".to_string()),
    }

    errors
}

fn condition_errors(condition: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    if !condition.get("field").is_some_and(Value::is_string) {
        errors.push("Field is required and must be a string".to_string());
    }

    let operator = condition
        .get("operator")
        .and_then(Value::as_str)
        .map(|op| Operator::from(op.to_string()));
    if !operator.as_ref().is_some_and(Operator::is_known) {
        errors.push(
            "Operator must be one of: equals, contains, exists, not_equals, greater_than, less_than"
                .to_string(),
        );
    }

    if operator != Some(Operator::Exists) && condition.get("value").is_none() {
        errors.push("Value is required for this operator".to_string());
    }

    errors
}

/// Value of `field` unless it is missing or null.
fn present<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

/// HTML-escape top-level string fields, except those stored verbatim.
pub fn sanitize_input(data: Value) -> Value {
    match data {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(s) if !UNESCAPED_FIELDS.contains(&key.as_str()) => {
                        let escaped = escape_html(&s);
                        (key, Value::String(escaped))
                    }
                    other => (key, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '/' => escaped.push_str("&#x2F;"),
            '\\' => escaped.push_str("&#x5C;"),
            '`' => escaped.push_str("&#96;"),
            other => escaped.push(other),
        }
    }
    escaped
}
