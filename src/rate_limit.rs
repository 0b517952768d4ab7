use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::domain::errors::ApiError;

/// Rate limiter configuration
pub struct RateLimiterConfig {
    /// Maximum requests per minute across all clients; 0 disables limiting
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 600,
        }
    }
}

/// Global rate limiter
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new rate limiter, or `None` when limiting is disabled
pub fn create_rate_limiter(config: RateLimiterConfig) -> Option<GlobalRateLimiter> {
    let per_minute = NonZeroU32::new(config.requests_per_minute)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))))
}

/// Middleware to apply rate limiting, installed with `from_fn_with_state`
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Rate limit exceeded on {}", request.uri().path());
            ApiError::RateLimitExceeded.into_response()
        }
    }
}
