use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use flagsnap_lib::integrity::constant_time_eq;

/// Outcome of checking a presented refresh token against configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthOutcome {
    Allowed,
    Unauthorized,
    /// No secret configured: the endpoint is disabled, not open.
    Disabled,
}

/// Extract bearer token from Authorization header value.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

/// Pull the bearer token out of request headers, if present.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
}

/// Check a presented token against the configured refresh secret. The
/// comparison is constant-time; a missing token compares as unauthorized
/// without touching the secret.
pub fn check_refresh_token(configured: Option<&str>, presented: Option<&str>) -> AuthOutcome {
    let Some(secret) = configured else {
        return AuthOutcome::Disabled;
    };
    match presented {
        Some(token) if constant_time_eq(secret, token) => AuthOutcome::Allowed,
        _ => AuthOutcome::Unauthorized,
    }
}

/// Return 401 Unauthorized response.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [("cache-control", "no-store")],
        Json(serde_json::json!({"error": "unauthorized"})),
    )
        .into_response()
}

/// Return 501 Not Implemented when no refresh secret is configured.
pub fn refresh_disabled() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        [("cache-control", "no-store")],
        Json(serde_json::json!({"error": "refresh is not configured"})),
    )
        .into_response()
}
