// tests/api_http.rs
//
// HTTP-level tests for the operator API without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use common::{harness, HarnessOpts};
use matchday_desk::api;

const BODY_LIMIT: usize = 1024 * 1024;

async fn call(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness(HarnessOpts::default());
    let app = api::router(h.orch.clone());
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn cycle_then_status_then_approve_publishes() {
    let h = harness(HarnessOpts::default());
    let app = api::router(h.orch.clone());

    let (status, report) = call(&app, "POST", "/cycle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["selected"], 1);
    let id = report["enqueued"][0].as_str().unwrap().to_string();

    let (_, st) = call(&app, "GET", "/status", None).await;
    assert_eq!(st["pending"][0]["id"], id.as_str());
    assert_eq!(st["posts_today"], 0);
    assert_eq!(st["max_daily"], 12);

    let (status, body) = call(&app, "POST", "/approve", Some(json!({ "ids": [id, "9999"] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], json!([id]));
    assert_eq!(body["results"][0]["outcome"], "published");
    assert!(body["results"][0]["draft"]["edit_url"].is_string());

    let (_, st) = call(&app, "GET", "/status", None).await;
    assert_eq!(st["pending"], json!([]));
    assert_eq!(st["posts_today"], 1);
    assert_eq!(st["ledger_entries"], 1);
}

#[tokio::test]
async fn skip_clears_pending() {
    let h = harness(HarnessOpts::default());
    let app = api::router(h.orch.clone());
    call(&app, "POST", "/cycle", None).await;

    let (status, body) = call(&app, "POST", "/skip", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skipped"].as_array().unwrap().len(), 1);
    assert!(h.orch.queue().list_pending().is_empty());
}

#[tokio::test]
async fn approve_reports_store_failure() {
    let h = harness(HarnessOpts::default());
    let app = api::router(h.orch.clone());
    call(&app, "POST", "/cycle", None).await;
    let id = h.orch.queue().list_pending()[0].id.clone();

    h.queue_store.fail_writes(true);
    let (status, body) = call(&app, "POST", "/approve", Some(json!({ "ids": [id.clone()] }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
    assert!(h.orch.queue().get(&id).unwrap().status == matchday_desk::ArticleStatus::Pending);
}

#[tokio::test]
async fn text_commands_match_telegram_surface() {
    let h = harness(HarnessOpts::default());
    let app = api::router(h.orch.clone());
    call(&app, "POST", "/cycle", None).await;

    let (status, body) = call(&app, "POST", "/command", Some(json!({ "text": "/choice" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("PENDING ARTICLES (1)"));

    let (_, body) = call(&app, "POST", "/command", Some(json!({ "text": "skip" }))).await;
    assert!(body["reply"].as_str().unwrap().starts_with("Skipped 1 pending"));

    let (status, _) = call(&app, "POST", "/command", Some(json!({ "text": "hello" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
