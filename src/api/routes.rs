use crate::api::handlers::runs;
use crate::types::{
    ArtifactResult, ClarificationRequest, DirectRunRequest, ReportData, RunResult, RunStage,
    RunStatus, StartRunRequest,
};
use crate::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        runs::start_run,
        runs::provide_clarification,
        runs::complete_clarifications,
        runs::run_direct,
        runs::get_run,
        runs::cancel_run,
    ),
    components(schemas(
        StartRunRequest,
        ClarificationRequest,
        DirectRunRequest,
        RunStatus,
        RunStage,
        RunResult,
        ReportData,
        ArtifactResult,
    )),
    tags((name = "runs", description = "Research runs"))
)]
pub struct ApiDoc;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/runs/{id}", post(runs::start_run).get(runs::get_run))
        .route(
            "/runs/{id}/clarifications",
            post(runs::provide_clarification),
        )
        .route("/runs/{id}/complete", post(runs::complete_clarifications))
        .route("/runs/{id}/direct", post(runs::run_direct))
        .route("/runs/{id}/cancel", post(runs::cancel_run))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
