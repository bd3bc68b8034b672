//! # Authentication Module
//!
//! API key authentication for the Castgraph HTTP API.
//!
//! When `CASTGRAPH_API_KEY` is set, every request except `/health` must send
//! the key:
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use super::types::ApiError;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Returns `Some(key)` if `CASTGRAPH_API_KEY` is set and non-empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("CASTGRAPH_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Constant-time key comparison.
///
/// Both keys are zero-padded to the same length so `ct_eq` always runs over
/// the same number of bytes; the length check happens afterwards.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

fn unauthorized() -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
}

/// API key authentication middleware.
///
/// Accepts both `Bearer <key>` and a raw `<key>` header value. `/health`
/// stays open for load balancer checks.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let Some(header_value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            path = %request.uri().path(),
            "Missing Authorization header"
        );
        return Err(unauthorized());
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if keys_match(provided, &expected) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            path = %request.uri().path(),
            "Authentication failed: invalid API key"
        );
        Err(unauthorized())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secreT"));
        assert!(!keys_match("secret", "secret-longer"));
        assert!(!keys_match("", "secret"));
    }

    #[test]
    fn test_keys_match_rejects_zero_padding() {
        assert!(!keys_match("abc\0", "abc"));
    }
}
