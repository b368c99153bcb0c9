//! Shared-secret checks for the admin API and the Telegram webhook

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::ApiState;
use super::admin::error_response;

/// Compare two secrets without leaking where they first differ
///
/// Length still leaks, which is fine for fixed-length keys.
#[must_use]
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Admin routes need the configured key; without one they are open
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };

    match bearer_token(req.headers()) {
        Some(token) if secrets_match(token, expected) => next.run(req).await,
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "rejected admin key");
            unauthorized("invalid admin key")
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "admin request without key");
            unauthorized("missing bearer token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", message).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_prefix_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(bearer_token(&headers), Some("s3cret"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic s3cret"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn secrets_compare_whole_value() {
        assert!(secrets_match("test-api-key", "test-api-key"));
        assert!(!secrets_match("test-api-kez", "test-api-key"));
        assert!(!secrets_match("test-api-key-2", "test-api-key"));
        assert!(!secrets_match("", "test-api-key"));
        assert!(secrets_match("", ""));
    }
}
