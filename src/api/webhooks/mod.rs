//! Webhook endpoints

use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use super::{rate_limit::rate_limit_middleware, ApiState};

pub mod telegram;

/// Telegram webhook under both of its historical paths
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/webhook/telegram", post(telegram::handle_update))
        .route("/telegram/webhook", post(telegram::handle_update))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}
