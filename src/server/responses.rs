use crate::mock::Mock;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Success envelope: `{status: true, message, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status_code: StatusCode,
    status: bool,
    message: &'static str,
    data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self {
            status_code: StatusCode::OK,
            status: true,
            message,
            data,
        }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct MockList {
    count: usize,
    mocks: Vec<Arc<Mock>>,
}

impl From<Vec<Arc<Mock>>> for MockList {
    fn from(mocks: Vec<Arc<Mock>>) -> Self {
        Self {
            count: mocks.len(),
            mocks,
        }
    }
}
