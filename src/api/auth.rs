// =============================================================================
// Bearer Token Authentication — Axum Middleware
// =============================================================================
//
// Two credentials guard the API:
//
//   - `AuthBearer` validates `Authorization: Bearer <token>` against
//     EMBER_API_TOKEN and protects the management/read surface.
//   - `CronAuth` validates the same header shape against EMBER_CRON_SECRET
//     and protects the scheduler trigger endpoint, so only the external cron
//     dispatcher (or an operator holding the secret) can start a scan.
//
// Both comparisons are constant time, and both fail closed: an unset secret
// rejects every request rather than letting any through.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

// =============================================================================
// Constant-time comparison
// =============================================================================

/// Compare two byte slices in constant time. Returns `true` if they are
/// identical. The comparison always examines every byte of both slices even
/// when a mismatch is found early, preventing timing side-channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // A length mismatch already leaks that lengths differ, which is
        // acceptable for token authentication (the attacker does not control
        // the expected token length).
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Pull the bearer token out of the Authorization header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Rejection type returned when authentication fails.
pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

fn forbidden(message: &'static str) -> AuthRejection {
    AuthRejection {
        status: StatusCode::FORBIDDEN,
        message,
    }
}

/// Shared validation: header token against the named env secret.
fn validate_against_env(parts: &Parts, env_var: &str) -> Result<String, AuthRejection> {
    // Read on every request so secret rotation does not require a restart.
    let expected = std::env::var(env_var).unwrap_or_default();

    if expected.is_empty() {
        warn!(env_var, "secret is not set — rejecting all requests");
        return Err(forbidden("Server authentication not configured"));
    }

    let token = match bearer_token(parts) {
        Some(t) => t,
        None => {
            warn!("Missing or malformed Authorization header");
            return Err(forbidden("Missing or invalid authorization token"));
        }
    };

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        warn!("Invalid token presented");
        return Err(forbidden("Invalid authorization token"));
    }

    Ok(token.to_string())
}

// =============================================================================
// Extractors
// =============================================================================

/// Axum extractor validating the API token (`EMBER_API_TOKEN`).
pub struct AuthBearer(pub String);

impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        validate_against_env(parts, "EMBER_API_TOKEN").map(AuthBearer)
    }
}

/// Axum extractor validating the scheduler credential (`EMBER_CRON_SECRET`).
pub struct CronAuth;

impl<S> FromRequestParts<S> for CronAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        validate_against_env(parts, "EMBER_CRON_SECRET").map(|_| CronAuth)
    }
}

// =============================================================================
// Tests
// =============================================================================
