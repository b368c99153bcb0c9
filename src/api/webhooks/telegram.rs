//! Telegram webhook handler

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::api::ApiState;
use crate::api::auth::secrets_match;
use crate::telegram::Update;

/// Header Telegram uses to echo the secret given to `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Telegram webhook response
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Handle an incoming update
///
/// Returns 200 immediately and processes the update in a background task.
/// Telegram retries slow webhooks, so duplicates are dropped by update id.
#[allow(clippy::unused_async)]
pub async fn handle_update(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> (StatusCode, Json<WebhookResponse>) {
    if let Some(expected) = state.webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if !provided.is_some_and(|p| secrets_match(p, expected)) {
            tracing::warn!("Telegram webhook secret mismatch");
            return (StatusCode::FORBIDDEN, Json(WebhookResponse { ok: false }));
        }
    }

    tracing::debug!(update_id = update.update_id, "received Telegram update");

    {
        let mut dedup = state
            .dedup
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if dedup.is_duplicate(update.update_id) {
            tracing::debug!(update_id = update.update_id, "duplicate Telegram update, skipping");
            return (StatusCode::OK, Json(WebhookResponse { ok: true }));
        }
    }

    if update.sender().is_some_and(|u| u.is_bot) {
        tracing::debug!(update_id = update.update_id, "ignoring bot sender");
        return (StatusCode::OK, Json(WebhookResponse { ok: true }));
    }

    let assistant = state.assistant.clone();
    tokio::spawn(async move {
        assistant.process_update(update).await;
    });

    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}
