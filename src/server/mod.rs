//! HTTP surface of the mock server.
//!
//! Routes:
//!
//! - `GET /health` - liveness and request counters
//! - `/configure-mock` - bearer-gated CRUD, search and statistics for mocks
//! - everything else - resolved against the registered mocks

mod admin;
mod auth;
mod error;
mod execute;
mod responses;

pub use auth::authenticate;
pub use error::ApiError;
pub use responses::{ApiResponse, MockList};

use crate::config::{AuthConfig, GlobalSettings, MockServerConfig};
use crate::registry::Registry;
use axum::extract::{DefaultBodyLimit, OriginalUri, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const CONFIGURE_ROOT_PATH: &str = "/configure-mock";

const HEALTH_PATH: &str = "/health";
const MOCK_LIST_PATH: &str = "/";
const MOCK_STATS_PATH: &str = "/stats";
const MOCK_SEARCH_PATH: &str = "/search";
const MOCK_ITEM_PATH: &str = "/{id}";

/// Path prefixes that are never answered by mocks.
const RESERVED_PREFIXES: [&str; 2] = [CONFIGURE_ROOT_PATH, HEALTH_PATH];

fn is_reserved_path(path: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<Registry>,
    settings: Arc<GlobalSettings>,
    auth: Arc<AuthConfig>,
    counters: Arc<RequestCounters>,
    started_at: Instant,
}

impl AppState {
    /// Build the state from configuration, registering its startup mocks.
    pub fn new(config: &MockServerConfig) -> anyhow::Result<Self> {
        let registry = Registry::new();
        for data in config.seed_mocks()? {
            registry.create(data);
        }

        info!(
            mocks = registry.len(),
            tokens = config.auth.tokens.len(),
            "Mock server initialized"
        );

        Ok(Self {
            registry: Arc::new(registry),
            settings: Arc::new(config.settings.clone()),
            auth: Arc::new(config.auth.clone()),
            counters: Arc::new(RequestCounters::default()),
            started_at: Instant::now(),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn counters(&self) -> &RequestCounters {
        &self.counters
    }
}

/// Counters over resolved traffic.
#[derive(Debug, Default)]
pub struct RequestCounters {
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Requests answered by a mock.
    requests_matched: AtomicU64,
    /// Requests no mock answered, including header-gated rejections.
    requests_unmatched: AtomicU64,
}

impl RequestCounters {
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_matched(&self) {
        self.requests_matched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unmatched(&self) {
        self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let configure = Router::new()
        .route(
            MOCK_LIST_PATH,
            get(admin::list_mocks).post(admin::create_mock),
        )
        .route(MOCK_STATS_PATH, get(admin::mock_stats))
        .route(MOCK_SEARCH_PATH, get(admin::search_mocks))
        .route(
            MOCK_ITEM_PATH,
            get(admin::get_mock)
                .put(admin::update_mock)
                .delete(admin::delete_mock),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .fallback(route_not_found);

    Router::new()
        .route(HEALTH_PATH, get(health).fallback(route_not_found))
        .nest(CONFIGURE_ROOT_PATH, configure)
        .fallback(execute::execute_mock)
        .layer(DefaultBodyLimit::max(state.settings.max_body_bytes))
        .layer(cors_layer(&state.settings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy. Without configured origins any origin is allowed, but
/// credentials are only allowed for an explicit origin list.
fn cors_layer(settings: &GlobalSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ]);

    if settings.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::route_not_found(&uri)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    timestamp: String,
    uptime: f64,
    version: &'static str,
    mocks: usize,
    requests_total: u64,
    requests_matched: u64,
    requests_unmatched: u64,
}

async fn health(State(state): State<AppState>) -> ApiResponse<Health> {
    ApiResponse::ok(
        "Service is healthy",
        Health {
            status: "OK",
            timestamp: Utc::now().to_rfc3339(),
            uptime: state.started_at.elapsed().as_secs_f64(),
            version: env!("CARGO_PKG_VERSION"),
            mocks: state.registry.len(),
            requests_total: state.counters.total_requests(),
            requests_matched: state.counters.total_matched(),
            requests_unmatched: state.counters.total_unmatched(),
        },
    )
}
