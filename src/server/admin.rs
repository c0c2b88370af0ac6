//! Handlers for the `/configure-mock` API.

use super::auth::require_admin;
use super::{ApiError, ApiResponse, AppState, MockList};
use crate::context::Principal;
use crate::mock::{Mock, MockData, MockUpdate};
use crate::registry::{MockSearch, MockStats};
use crate::validate::{sanitize_input, validate_mock_data, validate_mock_update};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub async fn create_mock(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Arc<Mock>>, ApiError> {
    let Json(raw) = payload?;
    validate_mock_data(&raw)?;
    let data: MockData = serde_json::from_value(sanitize_input(raw))?;

    let mock = state.registry.create(data);
    info!(
        mock_id = %mock.id,
        method = %mock.method,
        route = %mock.route,
        "Mock configuration created"
    );
    Ok(ApiResponse::created(
        "Mock configuration created successfully",
        mock,
    ))
}

pub async fn list_mocks(State(state): State<AppState>) -> ApiResponse<MockList> {
    ApiResponse::ok(
        "Mocks retrieved successfully",
        state.registry.get_all().into(),
    )
}

pub async fn get_mock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Arc<Mock>>, ApiError> {
    let mock = state
        .registry
        .get_by_id(&parse_id(&id)?)
        .ok_or(ApiError::MockNotFound)?;
    Ok(ApiResponse::ok(
        "Mock retrieved successfully",
        mock,
    ))
}

pub async fn update_mock(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Arc<Mock>>, ApiError> {
    require_admin(&principal)?;
    let id = parse_id(&id)?;
    let Json(raw) = payload?;
    validate_mock_update(&raw)?;
    let update: MockUpdate = serde_json::from_value(sanitize_input(raw))?;

    let mock = state.registry.update(&id, update)?;
    info!(mock_id = %mock.id, user = %principal.id, "Mock configuration updated");
    Ok(ApiResponse::ok(
        "Mock updated successfully",
        mock,
    ))
}

pub async fn delete_mock(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Option<()>>, ApiError> {
    require_admin(&principal)?;
    let id = parse_id(&id)?;
    state.registry.delete(&id)?;
    info!(mock_id = %id, user = %principal.id, "Mock configuration deleted");
    Ok(ApiResponse::ok(
        "Mock deleted successfully",
        None,
    ))
}

pub async fn search_mocks(
    State(state): State<AppState>,
    Query(search): Query<MockSearch>,
) -> ApiResponse<MockList> {
    ApiResponse::ok(
        "Search completed successfully",
        state.registry.search(&search).into(),
    )
}

pub async fn mock_stats(State(state): State<AppState>) -> ApiResponse<MockStats> {
    ApiResponse::ok(
        "Statistics retrieved successfully",
        state.registry.stats(),
    )
}

// Ids that are not UUIDs cannot name a mock.
fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    id.parse().map_err(|_| ApiError::MockNotFound)
}
