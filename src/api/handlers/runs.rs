use crate::{
    types::{
        ClarificationRequest, DirectRunRequest, Result, RunResult, RunStatus, StartOptions,
        StartRunRequest,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};

/// Start a research run
#[utoipa::path(
    post,
    path = "/api/runs/{id}",
    request_body = StartRunRequest,
    params(("id" = String, Path, description = "Caller-chosen run id")),
    responses(
        (status = 200, description = "Run triaged; questions pending or report ready", body = RunStatus),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Run already exists"),
        (status = 502, description = "A mandatory stage failed")
    ),
    tag = "runs"
)]
pub async fn start_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(payload): Json<StartRunRequest>,
) -> Result<Json<RunStatus>> {
    let options = StartOptions {
        use_clarifications: payload.use_clarifications.unwrap_or(true),
        generate_artifact: payload
            .generate_artifact
            .unwrap_or(state.config.research.generate_artifact),
    };

    let status = state
        .host
        .start_research(&run_id, &payload.query, options)
        .await?;
    Ok(Json(status))
}

/// Answer one clarification question
#[utoipa::path(
    post,
    path = "/api/runs/{id}/clarifications",
    request_body = ClarificationRequest,
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Answer recorded", body = RunStatus),
        (status = 400, description = "Question index out of range"),
        (status = 409, description = "Run not started or not awaiting clarifications")
    ),
    tag = "runs"
)]
pub async fn provide_clarification(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(payload): Json<ClarificationRequest>,
) -> Result<Json<RunStatus>> {
    let status = state
        .host
        .provide_single_clarification(&run_id, payload.question_index, &payload.answer)
        .await?;
    Ok(Json(status))
}

/// Finish the clarification handshake and run the research
#[utoipa::path(
    post,
    path = "/api/runs/{id}/complete",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Research completed", body = RunResult),
        (status = 409, description = "Run not started or not awaiting clarifications"),
        (status = 502, description = "A mandatory stage failed")
    ),
    tag = "runs"
)]
pub async fn complete_clarifications(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResult>> {
    let result = state.host.complete_clarifications(&run_id).await?;
    Ok(Json(result))
}

/// Run research without triage or clarifications
#[utoipa::path(
    post,
    path = "/api/runs/{id}/direct",
    request_body = DirectRunRequest,
    params(("id" = String, Path, description = "Caller-chosen run id")),
    responses(
        (status = 200, description = "Research completed", body = RunResult),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Run already exists"),
        (status = 502, description = "A mandatory stage failed")
    ),
    tag = "runs"
)]
pub async fn run_direct(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(payload): Json<DirectRunRequest>,
) -> Result<Json<RunResult>> {
    let generate_artifact = payload
        .generate_artifact
        .unwrap_or(state.config.research.generate_artifact);

    let result = state
        .host
        .run_direct(&run_id, &payload.query, generate_artifact)
        .await?;
    Ok(Json(result))
}

/// Current status of a run
#[utoipa::path(
    get,
    path = "/api/runs/{id}",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run status", body = RunStatus),
        (status = 404, description = "Unknown run")
    ),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>> {
    Ok(Json(state.host.status(&run_id)?))
}

/// Cancel a run
#[utoipa::path(
    post,
    path = "/api/runs/{id}/cancel",
    params(("id" = String, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run cancelled", body = RunStatus),
        (status = 404, description = "Unknown run"),
        (status = 409, description = "Run already finished")
    ),
    tag = "runs"
)]
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>> {
    Ok(Json(state.host.cancel(&run_id).await?))
}
