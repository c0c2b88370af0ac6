//! Request matching logic.
//!
//! Resolves an incoming request to at most one registered mock.

use crate::mock::Mock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Matching failures that are not a plain "no match".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// A mock exists for the route but it requires headers the request
    /// did not satisfy.
    #[error("Authorization required")]
    AuthRequired,
}

/// A parsed route pattern such as `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<RouteSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteSegment {
    Literal(String),
    Param(String),
}

impl RoutePattern {
    pub fn parse(route: &str) -> Self {
        let segments = route
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => RouteSegment::Param(name.to_string()),
                _ => RouteSegment::Literal(segment.to_string()),
            })
            .collect();

        Self { segments }
    }

    /// Match a concrete path segment-for-segment, returning the named
    /// parameter captures on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                RouteSegment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                RouteSegment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        Some(params)
    }
}

/// Find the single mock that should answer this request.
///
/// Candidates are the mocks whose method and route match. Among those that
/// also satisfy their url and body constraints:
///
/// 1. the first mock whose header constraint is non-empty and satisfied wins;
/// 2. if the request presents a header some header-gated mock requires, but
///    with a different value, resolution fails with
///    [`MatchError::AuthRequired`];
/// 3. otherwise the first mock without header constraints wins;
/// 4. otherwise, if any header-gated mock was left unsatisfied, resolution
///    fails with [`MatchError::AuthRequired`].
pub fn find_matching_mock(
    mocks: &[Arc<Mock>],
    route_path: &str,
    method: &str,
    url_params: &HashMap<String, String>,
    body_params: &Value,
    headers: &HashMap<String, String>,
) -> Result<Option<Arc<Mock>>, MatchError> {
    let candidates: Vec<&Arc<Mock>> = mocks
        .iter()
        .filter(|mock| mock.method.matches(method))
        .filter(|mock| RoutePattern::parse(&mock.route).matches(route_path).is_some())
        .collect();

    debug!(
        route = %route_path,
        method = %method,
        candidates = candidates.len(),
        "Candidate mocks found"
    );

    if candidates.is_empty() {
        return Ok(None);
    }

    let (gated, open): (Vec<&Arc<Mock>>, Vec<&Arc<Mock>>) = candidates
        .into_iter()
        .filter(|mock| {
            matches_params(&mock.url_params, url_params)
                && matches_body(&mock.body_params, body_params)
        })
        .partition(|mock| mock.requires_headers());

    if let Some(best) = gated
        .iter()
        .find(|mock| matches_headers(&mock.headers, headers))
    {
        debug!(mock_id = %best.id, "Best match found");
        return Ok(Some(Arc::clone(*best)));
    }

    if gated
        .iter()
        .any(|mock| presents_mismatched_header(&mock.headers, headers))
    {
        debug!(route = %route_path, "Request headers rejected by a gated mock");
        return Err(MatchError::AuthRequired);
    }

    if let Some(permissive) = open.first() {
        debug!(mock_id = %permissive.id, "Permissive match found");
        return Ok(Some(Arc::clone(*permissive)));
    }

    if !gated.is_empty() {
        debug!(route = %route_path, "Mocks require headers that did not match");
        return Err(MatchError::AuthRequired);
    }

    Ok(None)
}

/// Capture the `:name` segments of `route` from the concrete `path`,
/// position by position.
pub fn extract_route_params(route: &str, path: &str) -> HashMap<String, String> {
    let parts: Vec<&str> = path.split('/').collect();
    RoutePattern::parse(route)
        .segments
        .iter()
        .enumerate()
        .filter_map(|(i, segment)| match segment {
            RouteSegment::Param(name) => parts.get(i).map(|p| (name.clone(), p.to_string())),
            RouteSegment::Literal(_) => None,
        })
        .collect()
}

/// Every expected key must be present with an exactly equal value.
fn matches_params(expected: &HashMap<String, String>, actual: &HashMap<String, String>) -> bool {
    expected
        .iter()
        .all(|(key, value)| actual.get(key) == Some(value))
}

/// Body constraints compare against top-level string fields of the body.
fn matches_body(expected: &HashMap<String, String>, body: &Value) -> bool {
    expected
        .iter()
        .all(|(key, value)| body.get(key).and_then(Value::as_str) == Some(value.as_str()))
}

/// Header names compare case-insensitively, values exactly. A header that
/// is present but empty counts as missing.
fn header_value<'a>(actual: &'a HashMap<String, String>, name: &str) -> Option<&'a String> {
    actual
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

fn matches_headers(expected: &HashMap<String, String>, actual: &HashMap<String, String>) -> bool {
    expected.iter().all(|(name, value)| match header_value(actual, name) {
        Some(got) if got == value => true,
        Some(got) => {
            debug!(header = %name, expected = %value, actual = %got, "Header mismatch");
            false
        }
        None => {
            debug!(header = %name, "Header not found in request");
            false
        }
    })
}

/// Whether the request carries one of the required headers with a wrong value.
fn presents_mismatched_header(
    expected: &HashMap<String, String>,
    actual: &HashMap<String, String>,
) -> bool {
    expected
        .iter()
        .any(|(name, value)| header_value(actual, name).is_some_and(|v| v != value))
}

/// Parse a query string (or url-encoded form body) into key-value pairs.
/// The first occurrence of a repeated key wins.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        params
            .entry(urlencoding_decode(key))
            .or_insert_with(|| urlencoding_decode(value));
    }

    params
}

/// Percent-decoding with `+` as space. Invalid escapes are kept verbatim.
fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let byte = s
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match byte {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                        continue;
                    }
                    None => decoded.push(b'%'),
                }
            }
            b'+' => decoded.push(b' '),
            other => decoded.push(other),
        }
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
