//! Template rendering for mock responses.
//!
//! String leaves may contain `{{dotted.path}}` placeholders which are
//! replaced with values from the request context. A placeholder whose path
//! does not resolve is left in place verbatim.

use crate::context::{lookup, value_to_string};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern is valid"));

/// Render a response template against the request context.
///
/// Arrays and objects keep their shape (object keys are never substituted);
/// numbers, booleans and null pass through unchanged.
pub fn render(template: &Value, context: &Value) -> Value {
    match template {
        Value::String(s) => Value::String(render_str(s, context)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render(v, context)).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), render(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute every placeholder in a single string.
pub fn render_str(template: &str, context: &Value) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            lookup(context, caps[1].trim())
                .and_then(value_to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
