use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::commands::{self, OperatorCommand};
use crate::orchestrator::{CycleError, Orchestrator, PublishResult};

#[derive(Clone)]
pub struct AppState {
    pub orch: Arc<Orchestrator>,
}

pub fn router(orch: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .route("/approve", post(approve))
        .route("/skip", post(skip))
        .route("/cycle", post(cycle))
        .route("/command", post(command))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { orch })
}

fn store_failure(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

#[derive(Serialize)]
struct PendingView {
    id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    title: String,
    type_tag: String,
    source: String,
}

#[derive(Serialize)]
struct StatusResp {
    pending: Vec<PendingView>,
    approved: Vec<String>,
    posts_today: u32,
    quota_date: chrono::NaiveDate,
    max_daily: u32,
    per_job: u32,
    ledger_entries: usize,
    cycle_running: bool,
}

async fn status(State(st): State<AppState>) -> Json<StatusResp> {
    let q = st.orch.queue();
    let quota = st.orch.quota().snapshot();
    let limiter = st.orch.quota().limiter();
    let pending = q
        .list_pending()
        .into_iter()
        .map(|a| PendingView {
            id: a.id,
            created_at: a.created_at,
            title: a.generated_title,
            type_tag: a.type_tag,
            source: a.source_item.source_name,
        })
        .collect();
    Json(StatusResp {
        pending,
        approved: q.list_approved().into_iter().map(|a| a.id).collect(),
        posts_today: quota.count,
        quota_date: quota.date,
        max_daily: limiter.max_daily,
        per_job: limiter.per_job,
        ledger_entries: st.orch.ledger().len(),
        cycle_running: st.orch.is_cycle_running(),
    })
}

#[derive(Deserialize)]
struct ApproveReq {
    ids: Vec<String>,
}

#[derive(Serialize)]
struct ApproveResp {
    approved: Vec<String>,
    results: Vec<PublishResult>,
}

/// Approve, then publish what was approved right away.
async fn approve(State(st): State<AppState>, Json(body): Json<ApproveReq>) -> Response {
    let approved = match st.orch.queue().approve(&body.ids) {
        Ok(a) => a,
        Err(e) => return store_failure(e),
    };
    let results = st.orch.publish_ids(approved.as_slice()).await;
    Json(ApproveResp { approved, results }).into_response()
}

async fn skip(State(st): State<AppState>) -> Response {
    match st.orch.queue().skip_all_pending() {
        Ok(skipped) => Json(json!({ "skipped": skipped })).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn cycle(State(st): State<AppState>) -> Response {
    match st.orch.run_cycle().await {
        Ok(report) => Json(report).into_response(),
        Err(CycleError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a cycle is already running" })),
        )
            .into_response(),
        Err(e) => store_failure(e),
    }
}

#[derive(Deserialize)]
struct CommandReq {
    text: String,
}

/// Same text commands the Telegram listener understands.
async fn command(State(st): State<AppState>, Json(body): Json<CommandReq>) -> Response {
    match OperatorCommand::parse(&body.text) {
        Some(cmd) => {
            let reply = commands::execute(&st.orch, cmd).await;
            Json(json!({ "reply": reply })).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unknown command" })),
        )
            .into_response(),
    }
}
