mod common;

use axum_test::TestServer;
use common::mocks::{plan, ScriptedInvoker};
use delve::agents::AgentKind;
use delve::db::{FileRunStore, RunStore};
use delve::research::{ClarificationState, RunState};
use delve::types::{AppError, RunStage, StartOptions};
use delve::{build_app, AppState, DelveConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

async fn create_test_server(invoker: ScriptedInvoker, output_dir: &TempDir) -> TestServer {
    let mut config = DelveConfig::default();
    config.research.output_dir = output_dir.path().to_path_buf();

    let state = AppState::with_invoker(config, Arc::new(invoker))
        .await
        .expect("Failed to build app state");
    TestServer::new(build_app(state)).expect("Failed to create test server")
}

// ============= Health Check Tests =============

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_openapi_document_lists_run_routes() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/api/runs/{id}"].is_object());
    assert!(body["paths"]["/api/runs/{id}/clarifications"].is_object());
}

// ============= Run Tests =============

#[tokio::test]
async fn test_start_run_completes_specific_query() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server
        .post("/api/runs/tokyo")
        .json(&json!({ "query": "current population of Tokyo Japan in 2024" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["stage"]["stage"], "done");
    assert_eq!(body["clarification_questions"], json!([]));
    assert_eq!(body["report"]["short_summary"], "3 sources");
}

#[tokio::test]
async fn test_clarification_round_trip() {
    let dir = TempDir::new().unwrap();
    let server =
        create_test_server(ScriptedInvoker::new().clarifying(&["budget?", "cuisine?"]), &dir)
            .await;

    let response = server
        .post("/api/runs/melbourne")
        .json(&json!({ "query": "best restaurants in Melbourne" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["stage"]["stage"], "awaiting_clarifications");
    assert_eq!(body["clarification_questions"], json!(["budget?", "cuisine?"]));

    let response = server
        .post("/api/runs/melbourne/clarifications")
        .json(&json!({ "question_index": 0, "answer": "mid-range" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["clarification_responses"]["0"], "mid-range");

    let response = server.post("/api/runs/melbourne/complete").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let enriched = body["enriched_query"].as_str().unwrap();
    assert!(enriched.contains("budget?: mid-range"));
    assert!(enriched.contains("cuisine?: No specific preference"));

    let response = server.get("/api/runs/melbourne").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["stage"]["stage"], "done");
}

#[tokio::test]
async fn test_direct_run_with_artifact() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server
        .post("/api/runs/direct-1/direct")
        .json(&json!({ "query": "renewable energy adoption", "generate_artifact": true }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["artifact"]["success"], true);
    let path = body["artifact"]["file_path"].as_str().unwrap();
    assert!(std::path::Path::new(path).starts_with(dir.path()));
}

// ============= Error Mapping Tests =============

#[tokio::test]
async fn test_unknown_run_is_404() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server.get("/api/runs/missing").await;
    response.assert_status_not_found();
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_clarification_before_start_is_409() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    server
        .post("/api/runs/never-started/clarifications")
        .json(&json!({ "question_index": 0, "answer": "cheap" }))
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
    server
        .post("/api/runs/never-started/complete")
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_empty_query_is_400() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;

    let response = server
        .post("/api/runs/blank")
        .json(&json!({ "query": "  " }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_out_of_range_answer_is_400() {
    let dir = TempDir::new().unwrap();
    let server =
        create_test_server(ScriptedInvoker::new().clarifying(&["budget?"]), &dir).await;
    server
        .post("/api/runs/guard")
        .json(&json!({ "query": "best restaurants" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/runs/guard/clarifications")
        .json(&json!({ "question_index": 5, "answer": "cheap" }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_late_operations_are_409() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(ScriptedInvoker::new(), &dir).await;
    server
        .post("/api/runs/done/direct")
        .json(&json!({ "query": "q" }))
        .await
        .assert_status_ok();

    server
        .post("/api/runs/done/clarifications")
        .json(&json!({ "question_index": 0, "answer": "late" }))
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
    server
        .post("/api/runs/done/cancel")
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_mandatory_stage_failure_is_502() {
    let dir = TempDir::new().unwrap();
    let invoker = ScriptedInvoker::new().fail(AgentKind::Writer, "writer model overloaded");
    let server = create_test_server(invoker, &dir).await;

    let response = server
        .post("/api/runs/broken/direct")
        .json(&json!({ "query": "q" }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("writer model overloaded"));

    let status: Value = server.get("/api/runs/broken").await.json();
    assert_eq!(status["stage"]["stage"], "failed");
}

#[tokio::test]
async fn test_cancel_awaiting_run() {
    let dir = TempDir::new().unwrap();
    let invoker = ScriptedInvoker::new()
        .clarifying(&["budget?"])
        .reply(AgentKind::Planner, plan(&["a"]));
    let server = create_test_server(invoker, &dir).await;
    server
        .post("/api/runs/c1")
        .json(&json!({ "query": "best restaurants" }))
        .await
        .assert_status_ok();

    let response = server.post("/api/runs/c1/cancel").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["stage"]["stage"], "cancelled");

    server
        .post("/api/runs/c1/complete")
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
}

// ============= Startup Tests =============

async fn persisted_awaiting_run(dir: &TempDir) {
    let store = FileRunStore::new(dir.path()).await.unwrap();
    let mut state = RunState::new("saved", "best restaurants", StartOptions::default());
    state.advance(RunStage::AwaitingClarifications).unwrap();
    state.clarification = Some(ClarificationState::new(["budget?"]));
    store.save(&state).await.unwrap();
}

#[tokio::test]
async fn test_one_shot_state_leaves_persisted_runs_alone() {
    let output = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    persisted_awaiting_run(&state_dir).await;

    let mut config = DelveConfig::default();
    config.research.output_dir = output.path().to_path_buf();
    config.storage.state_dir = Some(state_dir.path().to_path_buf());

    let invoker = Arc::new(ScriptedInvoker::new());
    let one_shot = AppState::one_shot(config.clone(), invoker.clone())
        .await
        .unwrap();
    assert!(matches!(
        one_shot.host.status("saved"),
        Err(AppError::NotFound(_))
    ));
    assert!(invoker.calls(AgentKind::Triage).is_empty());

    let server = AppState::with_invoker(config, invoker).await.unwrap();
    let status = server.host.status("saved").unwrap();
    assert_eq!(status.stage, RunStage::AwaitingClarifications);
}
