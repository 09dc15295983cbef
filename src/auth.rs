//! Bearer Auth Gate
//!
//! Validates `Authorization: Bearer <token>` on every inbound request before
//! any tool logic runs. Token comparison is constant-time. When no secret is
//! configured the gate passes everything through; main warns at startup
//! about that mode. Rejections use transport-level status codes with a small
//! JSON body, never the tool error shape.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::Config;

/// Outcome of evaluating one request's credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may proceed to dispatch
    Allowed,

    /// Header absent or not of the form `Bearer <token>` (401)
    Unauthorized,

    /// Token present but wrong (403)
    Forbidden,
}

/// Evaluate an Authorization header value against the configured secret.
///
/// `expected = None` means auth is disabled and everything is allowed.
pub fn evaluate(header: Option<&str>, expected: Option<&str>) -> AuthDecision {
    let Some(expected) = expected else {
        return AuthDecision::Allowed;
    };
    let Some(provided) = header.and_then(|h| h.strip_prefix("Bearer ")) else {
        return AuthDecision::Unauthorized;
    };
    if token_matches(provided, expected) {
        AuthDecision::Allowed
    } else {
        AuthDecision::Forbidden
    }
}

/// Constant-time token equality. Length mismatch short-circuits inside
/// `ct_eq`, which leaks only the length, not the content.
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// axum middleware wrapping every route uniformly; no tool is exempt.
pub async fn bearer_guard(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match evaluate(header, config.auth.token.as_deref()) {
        AuthDecision::Allowed => next.run(request).await,
        AuthDecision::Unauthorized => {
            warn!("rejected request: missing or malformed Authorization header");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing or malformed Authorization header" })),
            )
                .into_response()
        }
        AuthDecision::Forbidden => {
            warn!("rejected request: invalid bearer token");
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Invalid bearer token" })),
            )
                .into_response()
        }
    }
}
