//! Admin API endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::Serialize;

use super::{auth::require_api_key, ApiState};
use crate::cache::CacheStats;
use crate::db::TaskFilter;
use crate::rag::TASK_ENTITY;
use crate::scheduler::TriggerInfo;
use crate::Error;

/// Days of counters summed in `/admin/stats`
const STATS_WINDOW_DAYS: i64 = 7;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

pub(super) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(super) fn error_response(status: StatusCode, code: &str, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
}

fn internal(e: &Error) -> ApiError {
    tracing::error!(error = %e, "admin request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", &e.to_string())
}

fn scheduler_disabled() -> ApiError {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "scheduler_disabled",
        "Scheduler is not configured",
    )
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub job: String,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub today: BTreeMap<String, u64>,
    pub last_7_days: BTreeMap<String, u64>,
    pub embeddings: u64,
    pub inbox_pending: u64,
}

#[derive(Serialize)]
pub struct ReindexResponse {
    pub indexed: usize,
    pub failed: usize,
}

/// Every job with schedule, next and last run
#[allow(clippy::unused_async)]
async fn list_triggers(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TriggerInfo>>, ApiError> {
    let scheduler = state.scheduler.as_ref().ok_or_else(scheduler_disabled)?;
    scheduler.triggers().map(Json).map_err(|e| internal(&e))
}

/// Run a job now
#[allow(clippy::unused_async)]
async fn trigger_job(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let scheduler = state.scheduler.as_ref().ok_or_else(scheduler_disabled)?;
    match scheduler.trigger(&name) {
        Ok(job) => Ok((
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                job: job.name().to_string(),
                status: "triggered",
            }),
        )),
        Err(Error::NotFound(_)) => Err(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Unknown job: {name}"),
        )),
        Err(e) => Err(internal(&e)),
    }
}

fn collect_stats(state: &ApiState) -> crate::Result<StatsResponse> {
    let services = state.assistant.services();
    let today = services.settings.now().date_naive();
    Ok(StatsResponse {
        cache: services.cache.stats(),
        today: services.metrics.day(today)?,
        last_7_days: services
            .metrics
            .totals_since(today - Duration::days(STATS_WINDOW_DAYS - 1))?,
        embeddings: services.embeddings.count()?,
        inbox_pending: services.inbox.pending_count()?,
    })
}

/// Cache, counter, embedding and inbox figures
#[allow(clippy::unused_async)]
async fn stats(State(state): State<Arc<ApiState>>) -> Result<Json<StatsResponse>, ApiError> {
    collect_stats(&state).map(Json).map_err(|e| internal(&e))
}

/// Re-embed every pending task
async fn reindex(State(state): State<Arc<ApiState>>) -> Result<Json<ReindexResponse>, ApiError> {
    let services = state.assistant.services();
    let Some(retriever) = &services.retriever else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "embeddings_disabled",
            "Embeddings are not configured",
        ));
    };

    let tasks = services
        .tasks
        .list(&TaskFilter::pending())
        .map_err(|e| internal(&e))?;

    let mut response = ReindexResponse { indexed: 0, failed: 0 };
    for task in &tasks {
        match retriever.index(TASK_ENTITY, &task.id, &task.title).await {
            Ok(()) => response.indexed += 1,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "reindex failed");
                response.failed += 1;
            }
        }
    }
    tracing::info!(indexed = response.indexed, failed = response.failed, "reindex finished");
    Ok(Json(response))
}

/// Build admin router with auth middleware
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/triggers", get(list_triggers))
        .route("/trigger/{name}", post(trigger_job))
        .route("/stats", get(stats))
        .route("/reindex", post(reindex))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
