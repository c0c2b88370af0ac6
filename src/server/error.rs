use crate::matcher::MatchError;
use crate::registry::RegistryError;
use crate::validate::ValidationErrors;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, warn};

/// Errors surfaced to HTTP clients as `{status: false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Invalid mock configuration: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Mock configuration not found")]
    MockNotFound,

    #[error("Route {0} not found")]
    RouteNotFound(String),

    #[error("Mock not found for route: {route} with method: {method}")]
    NoMatch { route: String, method: String },

    #[error("Authorization header required or invalid")]
    AuthRequired,

    #[error("Access token is required")]
    MissingToken,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidJson | ApiError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Registry(RegistryError::NotFound(_))
            | ApiError::MockNotFound
            | ApiError::RouteNotFound(_)
            | ApiError::NoMatch { .. } => StatusCode::NOT_FOUND,
            ApiError::AuthRequired | ApiError::MissingToken | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl ApiError {
    /// Not-found error naming the request path and query.
    pub fn route_not_found(uri: &Uri) -> Self {
        let target = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string);
        ApiError::RouteNotFound(target)
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::AuthRequired => ApiError::AuthRequired,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "Rejected JSON payload");
        ApiError::InvalidJson
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            warn!(status = %status, error = %message, "Request failed");
        } else {
            debug!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(json!({"status": false, "message": message}))).into_response()
    }
}
