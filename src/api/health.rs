//! Health check endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response
#[derive(Serialize)]
pub struct DetailedResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// Individual component checks
#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub scheduler: CheckResult,
    pub llm: CheckResult,
    pub telegram: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn unavailable(message: &str) -> Self {
        Self {
            status: "unavailable",
            message: Some(message.to_string()),
        }
    }
}

/// Liveness probe
#[allow(clippy::unused_async)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Component status; 503 only when the database is down
async fn detailed(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<DetailedResponse>) {
    let database = check_database(&state);
    let scheduler = match &state.scheduler {
        Some(s) if s.is_running().await => CheckResult::ok(),
        Some(_) => CheckResult::fail("stopped"),
        None => CheckResult::unavailable("disabled"),
    };
    let llm = if state.assistant.services().llm.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("rule-based classification only")
    };
    let telegram = if state.assistant.messenger().is_enabled() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("no bot token")
    };

    let healthy = database.status == "ok";
    let degraded = scheduler.status == "fail";
    let status = match (healthy, degraded) {
        (false, _) => "down",
        (true, true) => "degraded",
        (true, false) => "ok",
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(DetailedResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            checks: HealthChecks {
                database,
                scheduler,
                llm,
                telegram,
            },
        }),
    )
}

fn check_database(state: &ApiState) -> CheckResult {
    match state.db.get() {
        Ok(conn) => match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(()) => CheckResult::ok(),
            Err(e) => CheckResult::fail(format!("query failed: {e}")),
        },
        Err(e) => CheckResult::fail(format!("connection failed: {e}")),
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed))
        .with_state(state)
}
