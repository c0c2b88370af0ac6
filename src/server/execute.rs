//! Answering arbitrary requests from the registered mocks.

use super::auth::optional_principal;
use super::{is_reserved_path, ApiError, AppState};
use crate::condition;
use crate::context::RequestContext;
use crate::matcher::{extract_route_params, find_matching_mock, parse_query_string};
use crate::mock::Mock;
use crate::template;
use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub async fn execute_mock(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    if is_reserved_path(request.uri().path()) {
        return Err(ApiError::route_not_found(request.uri()));
    }
    state.counters.record_request();

    let (parts, body) = request.into_parts();
    let route = parts.uri.path().to_string();
    let method = parts.method.as_str().to_string();
    let url_params = parse_query_string(parts.uri.query().unwrap_or(""));
    let headers = flatten_headers(&parts.headers);

    let bytes = to_bytes(body, state.settings.max_body_bytes)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;
    let body = parse_body(&headers, &bytes)?;

    let mocks = state.registry.snapshot();
    let mock = match find_matching_mock(&mocks, &route, &method, &url_params, &body, &headers) {
        Ok(Some(mock)) => mock,
        Ok(None) => {
            state.counters.record_unmatched();
            if state.settings.log_unmatched {
                warn!(method = %method, path = %route, "No matching mock found");
            }
            return Err(ApiError::NoMatch { route, method });
        }
        Err(err) => {
            state.counters.record_unmatched();
            if state.settings.log_unmatched {
                warn!(method = %method, path = %route, error = %err, "Mock rejected request headers");
            }
            return Err(err.into());
        }
    };

    state.counters.record_matched();
    if state.settings.log_matches {
        info!(
            mock_id = %mock.id,
            method = %method,
            path = %route,
            status = mock.status_code,
            "Request matched mock"
        );
    }

    let context = RequestContext {
        params: url_params,
        route_params: extract_route_params(&mock.route, &route),
        body,
        user: optional_principal(&parts.headers, &state.auth),
        user_agent: headers
            .get("user-agent")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        headers,
        timestamp: Utc::now(),
        ip: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
    .into_tree();

    let content = condition::evaluate(&mock, &context);
    let rendered = template::render(content, &context);
    Ok(build_response(&mock, rendered))
}

/// Lower-cased header names mapped to their first valid value.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            flat.entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    flat
}

fn parse_body(headers: &HashMap<String, String>, bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let content_type = headers
        .get("content-type")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();

    if content_type.starts_with(FORM_CONTENT_TYPE) {
        let form = parse_query_string(&String::from_utf8_lossy(bytes));
        return Ok(Value::Object(
            form.into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        ));
    }

    if content_type.contains("json") {
        return serde_json::from_slice(bytes).map_err(|_| ApiError::InvalidJson);
    }

    Ok(Value::Object(Map::new()))
}

fn build_response(mock: &Mock, body: Value) -> Response {
    let status = StatusCode::from_u16(mock.status_code).unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&mock.content_type) {
        Ok(value) => {
            headers.insert(CONTENT_TYPE, value);
        }
        Err(_) => warn!(mock_id = %mock.id, content_type = %mock.content_type, "Invalid content type"),
    }

    // Explicit response headers take precedence over the content type.
    for (name, value) in &mock.response_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(mock_id = %mock.id, header = %name, "Skipping invalid response header"),
        }
    }

    let body = if mock.content_type == JSON_CONTENT_TYPE {
        body.to_string()
    } else {
        match body {
            Value::String(text) => text,
            other => other.to_string(),
        }
    };

    (status, headers, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HttpMethod, MockData};
    use serde_json::json;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_flatten_headers_keeps_first_value() {
        let mut map = HeaderMap::new();
        map.append("x-trace", HeaderValue::from_static("one"));
        map.append("x-trace", HeaderValue::from_static("two"));
        let flat = flatten_headers(&map);
        assert_eq!(flat.get("x-trace").map(String::as_str), Some("one"));
    }

    #[test]
    fn test_parse_body_variants() {
        let json_headers = headers(&[("content-type", "application/json; charset=utf-8")]);
        assert_eq!(
            parse_body(&json_headers, br#"{"a":1}"#).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            parse_body(&json_headers, b"{oops"),
            Err(ApiError::InvalidJson)
        ));

        let form_headers = headers(&[("content-type", FORM_CONTENT_TYPE)]);
        assert_eq!(
            parse_body(&form_headers, b"name=Jane+Doe&role=admin").unwrap(),
            json!({"name": "Jane Doe", "role": "admin"})
        );

        assert_eq!(parse_body(&json_headers, b"").unwrap(), json!({}));
        assert_eq!(
            parse_body(&headers(&[("content-type", "text/plain")]), b"hi").unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_build_response_headers_override_content_type() {
        let mut data = MockData::new(HttpMethod::Get, "/x").with_response(json!({"ok": true}));
        data.response_headers
            .insert("Content-Type".to_string(), "application/vnd.api+json".to_string());
        data.response_headers
            .insert("X-Mock".to_string(), "yes".to_string());
        data.status_code = 201;
        let mock = Mock::create(data, Utc::now());

        let response = build_response(&mock, json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.api+json"
        );
        assert_eq!(response.headers().get("x-mock").unwrap(), "yes");
    }

    #[test]
    fn test_build_response_text_content() {
        let mut data = MockData::new(HttpMethod::Get, "/x");
        data.content_type = "text/plain".to_string();
        let mock = Mock::create(data, Utc::now());

        let response = build_response(&mock, json!("plain words"));
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }
}
