pub mod api;
pub mod live;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::application::actors::live_feed::LiveFeed;
use crate::application::services::monitor_service::MonitorService;
use crate::domain::errors::ApiError;
use crate::rate_limit::{create_rate_limiter, rate_limit_middleware, RateLimiterConfig};

/// Largest accepted request body (manual commands are tiny)
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonitorService>,
    pub feed: Arc<LiveFeed>,
}

impl AppState {
    pub fn new(service: Arc<MonitorService>, feed: Arc<LiveFeed>) -> Self {
        Self { service, feed }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Build the HTTP router: REST endpoints under `/api`, the live feed socket
/// and the health check.
pub fn router(state: AppState) -> Router {
    let server = &state.service.config().server;
    let cors = cors_layer(&server.cors_origins);
    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute: server.requests_per_minute,
    });

    let api = Router::new()
        .route("/coins/badges", get(api::coin_badges))
        .route("/portfolio/summary", get(api::portfolio_summary))
        .route("/status", get(api::status))
        .route("/balances", get(api::balances))
        .route("/trades", get(api::trades))
        .route("/price_history", get(api::price_history))
        .route("/state", get(api::trading_state))
        .route(
            "/manual_commands",
            post(api::submit_manual_command).get(api::list_manual_commands),
        )
        .route("/config/info", get(api::config_info));

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(api::health))
        .route("/ws/live", get(live::live_socket));

    if let Some(limiter) = limiter {
        app = app.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
    )
    .with_state(state)
}
