//! Mock definitions.
//!
//! A [`Mock`] describes how to answer one class of request: the route
//! pattern and method it listens on, the request-shape constraints that
//! narrow it down, and the response it renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// HTTP methods a mock can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Every supported method, in declaration order.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Lower-case name, as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }

    /// Case-insensitive comparison against a raw request method.
    pub fn matches(&self, method: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.matches(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = UnknownMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Comparison applied by a [`Condition`].
///
/// Operators arrive from stored, externally supplied data, so anything
/// unrecognised is kept as [`Operator::Unknown`] and never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    Exists,
    GreaterThan,
    LessThan,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::Exists => "exists",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::Unknown(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Operator::Unknown(_))
    }
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "exists" => Operator::Exists,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// A predicate over the request context paired with the body to answer
/// with when it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the request context, e.g. `params.tier`
    pub field: String,

    pub operator: Operator,

    /// Expected value. An explicit `null` is kept distinct from a missing value.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,

    /// Body returned when the condition holds
    #[serde(default)]
    pub response: Value,
}

/// A stored mock definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mock {
    pub id: Uuid,
    pub route: String,
    pub method: HttpMethod,
    pub url_params: HashMap<String, String>,
    pub body_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub response_headers: HashMap<String, String>,
    pub status_code: u16,
    pub response_content: Value,
    pub content_type: String,
    pub conditions: Option<Vec<Condition>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mock {
    /// Build a fresh mock from creation data, assigning id and timestamps.
    pub fn create(data: MockData, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            route: data.route,
            method: data.method,
            url_params: data.url_params,
            body_params: data.body_params,
            headers: data.headers,
            response_headers: data.response_headers,
            status_code: data.status_code,
            response_content: data.response_content,
            content_type: data.content_type,
            conditions: data.conditions,
            description: data.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Return a copy of this mock with the update applied and `updated_at` bumped.
    pub fn updated(&self, update: MockUpdate, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(route) = update.route {
            next.route = route;
        }
        if let Some(method) = update.method {
            next.method = method;
        }
        if let Some(url_params) = update.url_params {
            next.url_params = url_params;
        }
        if let Some(body_params) = update.body_params {
            next.body_params = body_params;
        }
        if let Some(headers) = update.headers {
            next.headers = headers;
        }
        if let Some(response_headers) = update.response_headers {
            next.response_headers = response_headers;
        }
        if let Some(status_code) = update.status_code {
            next.status_code = status_code;
        }
        if let Some(response_content) = update.response_content {
            next.response_content = response_content;
        }
        if let Some(content_type) = update.content_type {
            next.content_type = content_type;
        }
        if let Some(conditions) = update.conditions {
            next.conditions = conditions;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        next.updated_at = now;
        next
    }

    /// Whether this mock gates on at least one request header.
    pub fn requires_headers(&self) -> bool {
        !self.headers.is_empty()
    }
}

/// Payload for creating a mock. Omitted optional fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockData {
    pub route: String,

    pub method: HttpMethod,

    #[serde(default, deserialize_with = "map_or_null")]
    pub url_params: HashMap<String, String>,

    #[serde(default, deserialize_with = "map_or_null")]
    pub body_params: HashMap<String, String>,

    #[serde(default, deserialize_with = "map_or_null")]
    pub headers: HashMap<String, String>,

    #[serde(default, deserialize_with = "map_or_null")]
    pub response_headers: HashMap<String, String>,

    #[serde(default = "default_status")]
    pub status_code: u16,

    #[serde(default = "default_response_content")]
    pub response_content: Value,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,

    #[serde(default)]
    pub description: String,
}

impl MockData {
    /// Minimal creation data for `method route`, everything else defaulted.
    pub fn new(method: HttpMethod, route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method,
            url_params: HashMap::new(),
            body_params: HashMap::new(),
            headers: HashMap::new(),
            response_headers: HashMap::new(),
            status_code: default_status(),
            response_content: default_response_content(),
            content_type: default_content_type(),
            conditions: None,
            description: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_url_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body_params.insert(name.into(), value.into());
        self
    }

    pub fn with_response(mut self, content: Value) -> Self {
        self.response_content = content;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update. Only these fields can be changed after creation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockUpdate {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub url_params: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body_params: Option<HashMap<String, String>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub response_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default, deserialize_with = "present_value")]
    pub response_content: Option<Value>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// `Some(None)` clears the conditions; `None` leaves them untouched.
    #[serde(default, deserialize_with = "present_value")]
    pub conditions: Option<Option<Vec<Condition>>>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_status() -> u16 {
    200
}

fn default_response_content() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Deserialize a field that is present in the input, keeping explicit nulls.
fn present_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn map_or_null<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());

        let method: HttpMethod = serde_json::from_value(json!("OPTIONS")).unwrap();
        assert_eq!(method, HttpMethod::Options);
        assert_eq!(serde_json::to_value(method).unwrap(), json!("options"));
    }

    #[test]
    fn test_parse_mock_data_defaults() {
        let data: MockData = serde_json::from_value(json!({
            "route": "/api/users",
            "method": "GET"
        }))
        .unwrap();

        assert_eq!(data.method, HttpMethod::Get);
        assert_eq!(data.status_code, 200);
        assert_eq!(data.content_type, "application/json");
        assert_eq!(data.response_content, json!({}));
        assert!(data.conditions.is_none());
        assert!(data.headers.is_empty());
    }

    #[test]
    fn test_null_constraints_become_empty() {
        let data: MockData = serde_json::from_value(json!({
            "route": "/a",
            "method": "post",
            "headers": null,
            "urlParams": {"page": "1"}
        }))
        .unwrap();

        assert!(data.headers.is_empty());
        assert_eq!(data.url_params.get("page").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_conditions() {
        let data: MockData = serde_json::from_value(json!({
            "route": "/plans",
            "method": "get",
            "conditions": [
                {"field": "params.tier", "operator": "equals", "value": "pro", "response": {"plan": "pro"}},
                {"field": "body.flag", "operator": "exists", "response": "flagged"},
                {"field": "body.flag", "operator": "matches_regex", "value": ".*", "response": null}
            ]
        }))
        .unwrap();

        let conditions = data.conditions.unwrap();
        assert_eq!(conditions[0].operator, Operator::Equals);
        assert_eq!(conditions[0].value, Some(json!("pro")));
        assert_eq!(conditions[1].operator, Operator::Exists);
        assert_eq!(conditions[1].value, None);
        assert_eq!(
            conditions[2].operator,
            Operator::Unknown("matches_regex".to_string())
        );
    }

    #[test]
    fn test_explicit_null_condition_value_is_kept() {
        let condition: Condition = serde_json::from_value(json!({
            "field": "body.x",
            "operator": "equals",
            "value": null,
            "response": 1
        }))
        .unwrap();
        assert_eq!(condition.value, Some(Value::Null));
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let created = Utc::now();
        let mock = Mock::create(
            MockData::new(HttpMethod::Get, "/users/:id").with_description("old"),
            created,
        );

        let update: MockUpdate =
            serde_json::from_value(json!({"description": "new"})).unwrap();
        let later = created + chrono::Duration::seconds(5);
        let next = mock.updated(update, later);

        assert_eq!(next.id, mock.id);
        assert_eq!(next.route, "/users/:id");
        assert_eq!(next.method, HttpMethod::Get);
        assert_eq!(next.status_code, 200);
        assert_eq!(next.description, "new");
        assert_eq!(next.created_at, created);
        assert_eq!(next.updated_at, later);
    }

    #[test]
    fn test_update_can_clear_conditions() {
        let now = Utc::now();
        let mock = Mock::create(
            MockData::new(HttpMethod::Get, "/x").with_conditions(vec![Condition {
                field: "params.a".to_string(),
                operator: Operator::Exists,
                value: None,
                response: json!("a"),
            }]),
            now,
        );

        let untouched: MockUpdate = serde_json::from_value(json!({"statusCode": 201})).unwrap();
        assert!(mock.updated(untouched, now).conditions.is_some());

        let cleared: MockUpdate = serde_json::from_value(json!({"conditions": null})).unwrap();
        assert!(mock.updated(cleared, now).conditions.is_none());
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let result: Result<MockUpdate, _> = serde_json::from_value(json!({"id": "nope"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let mock = Mock::create(MockData::new(HttpMethod::Delete, "/items/:id"), Utc::now());
        let value = serde_json::to_value(&mock).unwrap();

        assert_eq!(value["method"], "delete");
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["contentType"], "application/json");
        assert!(value["createdAt"].is_string());
        assert!(value["conditions"].is_null());
        assert!(value["urlParams"].is_object());
    }
}
