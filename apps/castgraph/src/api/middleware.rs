//! # Middleware Module
//!
//! Global rate limiting for the Castgraph HTTP API.
//!
//! One token bucket is shared by every client. Configured via
//! `CASTGRAPH_RATE_LIMIT` (requests per second, default 100, 0 disables).

use super::types::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default rate limit: 100 requests per second.
const DEFAULT_RPS: u32 = 100;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a limiter allowing `requests_per_second`, bursting up to the
/// same amount. Zero falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RPS))
        .unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_second(rps);
    Arc::new(RateLimiter::direct(quota))
}

/// Read `CASTGRAPH_RATE_LIMIT`, falling back to the default when unset or
/// unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("CASTGRAPH_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RPS)
}

/// Reject with 429 once the shared bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "rate limit exceeded");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests",
        ));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================
