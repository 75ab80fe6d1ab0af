//! API Middleware
//!
//! Admin key authentication, request context and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::config::digest_key;
use crate::domain::{Actor, OperationContext};
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

fn correlation_id(headers: &HeaderMap) -> Uuid {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn unauthorized(message: &str, error_code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": message,
            "error_code": error_code
        })),
    )
        .into_response()
}

/// Compare two hex digests without short-circuiting on the first mismatch
fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

// =========================================================================
// Admin Key Authentication Middleware
// =========================================================================

/// Require a valid `X-Admin-Key` and mark the request as an admin operation
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let admin_key = match headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) if !key.trim().is_empty() => key,
        _ => return Err(unauthorized("Missing X-Admin-Key header", "missing_admin_key")),
    };

    if !digests_match(&digest_key(admin_key), &state.security.admin_key_digest) {
        tracing::warn!(
            uri = %request.uri(),
            "Rejected request with invalid admin key"
        );
        return Err(unauthorized("Invalid admin key", "invalid_admin_key"));
    }

    let context = OperationContext::new()
        .with_actor(Actor::Admin)
        .with_correlation_id(correlation_id(&headers));

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Request Context Middleware
// =========================================================================

/// Attach a public operation context unless one is already present
pub async fn request_context_middleware(mut request: Request<Body>, next: Next) -> Response {
    if request.extensions().get::<OperationContext>().is_none() {
        let context = OperationContext::new()
            .with_actor(Actor::Public)
            .with_correlation_id(correlation_id(request.headers()));
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}

// =========================================================================
// Header masking
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-admin-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation,
        "Request completed"
    );

    response
}
