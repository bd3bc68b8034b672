//! # Castgraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Character and edge counts
//! - `GET|POST /works/{work_id}/characters` - List or create a work's cast
//! - `GET|DELETE /characters/{id}` - Fetch or delete a character
//! - `POST /characters/{id}/relationships` - Add a relationship
//! - `DELETE /characters/{id}/relationships/{edge_id}` - Remove a relationship
//! - `GET /characters/{id}/relationships/by-type?type=T` - Related characters
//! - `GET /characters/{id}/network?max_depth=N` - Network expansion
//! - `GET /characters/{id}/stats` - Relationship counts
//! - `GET /characters/{id}/path/{target}` - Degrees of separation
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CASTGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `CASTGRAPH_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `CASTGRAPH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AddRelationshipRequest, ApiError, ApiJson, CharacterJson, CreateCharacterRequest,
    DeleteResponse, ErrorResponse, HealthResponse, NetworkEdgeJson, NetworkMemberJson,
    NetworkQuery, NetworkResponse, RelatedQuery, RelationshipJson, RemovalResponse,
    StatusResponse, kind_name,
};

use crate::config::QueryConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use castgraph_core::{CastError, CastGraph};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Methods the API answers to, for CORS preflight.
const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// The engine serializes conflicting mutations itself, so no outer lock is
/// needed.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CastGraph>,
    pub query: QueryConfig,
}

impl AppState {
    /// Create app state with default query limits.
    #[must_use]
    pub fn new(engine: CastGraph) -> Self {
        Self::with_query_config(engine, QueryConfig::default())
    }

    #[must_use]
    pub fn with_query_config(engine: CastGraph, query: QueryConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            query,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `CASTGRAPH_CORS_ORIGINS`.
///
/// - "*": allows all origins (development only)
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CASTGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (CASTGRAPH_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in CASTGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No CASTGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    cors_for(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - global token bucket (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set CASTGRAPH_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/works/{work_id}/characters",
            get(handlers::list_cast_handler).post(handlers::create_character_handler),
        )
        .route(
            "/characters/{id}",
            get(handlers::get_character_handler).delete(handlers::delete_character_handler),
        )
        .route(
            "/characters/{id}/relationships",
            post(handlers::add_relationship_handler),
        )
        .route(
            "/characters/{id}/relationships/by-type",
            get(handlers::related_by_type_handler),
        )
        .route(
            "/characters/{id}/relationships/{edge_id}",
            delete(handlers::remove_relationship_handler),
        )
        .route("/characters/{id}/network", get(handlers::network_handler))
        .route("/characters/{id}/stats", get(handlers::stats_handler))
        .route("/characters/{id}/path/{target}", get(handlers::path_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CastError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CastError::Storage(format!("Bind failed: {}", e)))?;

    tracing::info!("Castgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CastError::Storage(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn localhost_preflight_allows_delete() {
        let router = Router::new()
            .route("/characters/{id}", delete(|| async {}))
            .layer(build_localhost_cors());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/characters/1")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");

        let allowed = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(allowed.contains("DELETE"));
    }
}
