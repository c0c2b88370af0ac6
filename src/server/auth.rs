use super::{ApiError, AppState};
use crate::config::AuthConfig;
use crate::context::Principal;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";
const ADMIN_ROLE: &str = "admin";

/// Reject configuration requests that carry no acceptable bearer token.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(request.headers(), &state.auth)?;
    debug!(user = %principal.id, role = %principal.role, "Configuration request authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Resolve the principal behind a bearer token.
pub fn authenticate(headers: &HeaderMap, auth: &AuthConfig) -> Result<Principal, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingToken)?;

    if token.len() < AuthConfig::MIN_TOKEN_LEN {
        return Err(ApiError::InvalidToken);
    }

    if auth.tokens.is_empty() {
        return Ok(Principal {
            id: ADMIN_ROLE.to_string(),
            role: ADMIN_ROLE.to_string(),
        });
    }

    auth.tokens
        .iter()
        .find(|grant| grant.token == token)
        .map(|grant| Principal {
            id: grant.id.clone(),
            role: grant.role.clone(),
        })
        .ok_or(ApiError::InvalidToken)
}

/// Principal for requests where authentication is optional.
pub fn optional_principal(headers: &HeaderMap, auth: &AuthConfig) -> Option<Principal> {
    authenticate(headers, auth).ok()
}

/// Require the administrator role.
pub fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    if principal.role == ADMIN_ROLE {
        Ok(())
    } else {
        debug!(user = %principal.id, role = %principal.role, "Insufficient role");
        Err(ApiError::Forbidden)
    }
}
