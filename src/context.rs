//! Per-request context used by condition evaluation and templating.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Authenticated principal attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

/// Read-only data about the request being answered.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Query parameters
    pub params: HashMap<String, String>,
    /// Named route segment captures
    pub route_params: HashMap<String, String>,
    /// Parsed request body
    pub body: Value,
    /// Request headers, keys lower-cased
    pub headers: HashMap<String, String>,
    pub user: Option<Principal>,
    pub timestamp: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: String,
}

impl RequestContext {
    /// Turn the context into the JSON tree that dotted paths are resolved against.
    pub fn into_tree(self) -> Value {
        let mut tree = Map::new();
        tree.insert("params".into(), string_map(self.params));
        tree.insert("routeParams".into(), string_map(self.route_params));
        tree.insert("body".into(), self.body);
        tree.insert("headers".into(), string_map(self.headers));
        tree.insert(
            "user".into(),
            self.user.map_or(Value::Null, |user| {
                let mut principal = Map::new();
                principal.insert("id".into(), Value::String(user.id));
                principal.insert("role".into(), Value::String(user.role));
                Value::Object(principal)
            }),
        );
        tree.insert(
            "timestamp".into(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        tree.insert("ip".into(), self.ip.map_or(Value::Null, Value::String));
        tree.insert("userAgent".into(), Value::String(self.user_agent));
        Value::Object(tree)
    }
}

fn string_map(map: HashMap<String, String>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

/// Resolve a dotted path such as `body.user.name` against `context`.
///
/// Objects are walked by key and arrays by numeric index. Anything that
/// cannot be walked yields `None`.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// String form of a resolved value. `null` has none.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
