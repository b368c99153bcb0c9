//! API endpoint integration tests

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

mod common;
use common::{API_KEY, WEBHOOK_SECRET, build_test_router};

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn update(update_id: i64, text: &str) -> String {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": 1,
            "date": 0,
            "chat": { "id": 42, "type": "private" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ana" },
            "text": text,
        }
    })
    .to_string()
}

fn webhook_request(body: String, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-telegram-bot-api-secret-token", secret);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_detailed_health_reports_components() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/detailed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Scheduler is built but never started in tests
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["scheduler"]["status"], "fail");
    assert_eq!(json["checks"]["llm"]["status"], "unavailable");
    assert_eq!(json["checks"]["telegram"]["status"], "ok");
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let (app, _, recorder) = build_test_router();

    let response = app
        .oneshot(webhook_request(update(1, "hola"), Some("nope")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["ok"], false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn test_webhook_rejects_missing_secret() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(webhook_request(update(1, "hola"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_processes_update_in_background() {
    let (app, _, recorder) = build_test_router();

    let response = app
        .oneshot(webhook_request(update(10, "hola"), Some(WEBHOOK_SECRET)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["ok"], true);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let sent = recorder.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 42);
    assert!(sent[0].1.contains("Ana"));
}

#[tokio::test]
async fn test_webhook_drops_duplicate_updates() {
    let (app, _, recorder) = build_test_router();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(webhook_request(update(11, "hola"), Some(WEBHOOK_SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recorder.messages().len(), 1);
}

#[tokio::test]
async fn test_webhook_ignores_bots() {
    let (app, _, recorder) = build_test_router();
    let body = serde_json::json!({
        "update_id": 12,
        "message": {
            "message_id": 1,
            "chat": { "id": 42, "type": "private" },
            "from": { "id": 99, "is_bot": true, "first_name": "Bot" },
            "text": "hola",
        }
    })
    .to_string();

    let response = app
        .oneshot(webhook_request(body, Some(WEBHOOK_SECRET)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn test_admin_requires_auth() {
    let (app, _, _) = build_test_router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/triggers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/triggers")
                .header("Authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "unauthorized");
    assert_eq!(json["error"]["message"], "invalid admin key");
}

#[tokio::test]
async fn test_admin_lists_triggers() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/triggers")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let jobs = json.as_array().unwrap();
    assert_eq!(jobs.len(), 9);
    let briefing = jobs
        .iter()
        .find(|j| j["name"] == "morning_briefing")
        .unwrap();
    assert_eq!(briefing["schedule"], "30 6 * * *");
    assert!(briefing["next_run"].is_string());
}

#[tokio::test]
async fn test_admin_trigger_unknown_job() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/trigger/not_a_job")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_admin_trigger_runs_job() {
    let (app, _, recorder) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/trigger/post_payday")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["job"], "post_payday");
    assert_eq!(json["status"], "triggered");

    tokio::time::sleep(Duration::from_millis(300)).await;
    let sent = recorder.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 42);
}

#[tokio::test]
async fn test_admin_stats() {
    let (app, assistant, _) = build_test_router();
    assistant.handle_text(42, "hola", None).await.unwrap();
    assistant
        .handle_text(42, "asdf qwerty zxcv", None)
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/stats")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["today"]["messages"], 2);
    assert_eq!(json["last_7_days"]["messages"], 2);
    assert_eq!(json["inbox_pending"], 1);
    assert_eq!(json["embeddings"], 0);
    assert!(json["cache"].is_object());
}

#[tokio::test]
async fn test_admin_reindex_without_embeddings() {
    let (app, _, _) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/reindex")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "embeddings_disabled");
}
