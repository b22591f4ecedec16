use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ============= Stage Output Types =============

/// Decision produced once per run by the triage agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TriageDecision {
    /// Whether the query needs clarifying questions before research starts
    #[serde(alias = "needs_clarifications")]
    pub needs_clarification: bool,
    /// Explanation of the decision
    #[serde(default)]
    pub reasoning: String,
}

/// Questions produced by the clarifying agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Clarifications {
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    /// 0-based position, stable for the lifetime of the run
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub question_index: usize,
    pub text: String,
}

/// A single planned web search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlanItem {
    /// The search term to use
    pub query: String,
    /// Why this search helps answer the query
    #[serde(default)]
    pub reason: String,
}

/// Ordered searches produced by the planner agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlan {
    pub searches: Vec<SearchPlanItem>,
}

/// Result of a single search task. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "summary", rename_all = "snake_case")]
pub enum SearchOutcome {
    Success(String),
    Absent,
}

/// A successful search, tagged with its position in the plan
///
/// Results arrive in completion order; `plan_index` lets consumers restore
/// plan order when they need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSearch {
    pub plan_index: usize,
    pub query: String,
    pub summary: String,
}

/// Final output of the writer agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct ReportData {
    /// A short 2-3 sentence summary of the findings
    pub short_summary: String,
    /// The full report in markdown
    pub markdown_report: String,
    /// Suggested topics to research further
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// Presentation choices made by the artifact agent for a finished report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactBrief {
    /// Document title, at most a dozen words
    #[serde(default)]
    pub title: String,
    /// Body font size in points
    #[serde(default)]
    pub font_size: Option<u32>,
    /// Accent color as a CSS hex value such as `#1f4e79`
    #[serde(default)]
    pub primary_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
}

/// Outcome of the optional artifact-generation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactResult {
    pub success: bool,
    pub file_path: Option<String>,
    pub error_message: Option<String>,
}

impl ArtifactResult {
    pub fn generated(file_path: impl Into<String>) -> Self {
        Self {
            success: true,
            file_path: Some(file_path.into()),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            file_path: None,
            error_message: Some(message.into()),
        }
    }
}

// ============= Run Types =============

/// Stage of a research run
///
/// Stages only move forward. `Failed` and `Cancelled` are recorded by the
/// run host when a mandatory stage aborts or the driver cancels the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RunStage {
    Created,
    Triaged,
    AwaitingClarifications,
    Planning,
    Searching,
    Writing,
    GeneratingArtifact,
    Done,
    Failed { reason: String },
    Cancelled,
}

impl RunStage {
    /// Position in the forward-only ordering of stages
    pub fn ordinal(&self) -> u8 {
        match self {
            RunStage::Created => 0,
            RunStage::Triaged => 1,
            RunStage::AwaitingClarifications => 2,
            RunStage::Planning => 3,
            RunStage::Searching => 4,
            RunStage::Writing => 5,
            RunStage::GeneratingArtifact => 6,
            RunStage::Done | RunStage::Failed { .. } | RunStage::Cancelled => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStage::Done | RunStage::Failed { .. } | RunStage::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunStage::Created => "created",
            RunStage::Triaged => "triaged",
            RunStage::AwaitingClarifications => "awaiting_clarifications",
            RunStage::Planning => "planning",
            RunStage::Searching => "searching",
            RunStage::Writing => "writing",
            RunStage::GeneratingArtifact => "generating_artifact",
            RunStage::Done => "done",
            RunStage::Failed { .. } => "failed",
            RunStage::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Options chosen by the caller when a run starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Opt into the clarification handshake when triage asks for it
    #[serde(default)]
    pub use_clarifications: bool,
    /// Run the artifact-generation stage after the report is written
    #[serde(default)]
    pub generate_artifact: bool,
}

/// Terminal result delivered to the caller of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunResult {
    pub report: ReportData,
    pub artifact: Option<ArtifactResult>,
    pub enriched_query: Option<String>,
}

/// Snapshot of a run returned by every externally invoked operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunStatus {
    pub run_id: String,
    pub stage: RunStage,
    pub original_query: String,
    /// Empty unless the run entered the clarification handshake
    pub clarification_questions: Vec<String>,
    /// Answers recorded so far, keyed by question index
    pub clarification_responses: BTreeMap<usize, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactResult>,
}

/// Progress notifications published while runs execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StageChanged { run_id: String, stage: RunStage },
    SearchProgress {
        run_id: String,
        completed: usize,
        total: usize,
    },
}

// ============= API Types =============

/// Body of `POST /api/runs/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartRunRequest {
    pub query: String,
    /// Defaults to true
    #[serde(default)]
    pub use_clarifications: Option<bool>,
    /// Defaults to `[research] generate_artifact`
    #[serde(default)]
    pub generate_artifact: Option<bool>,
}

/// Body of `POST /api/runs/{id}/clarifications`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClarificationRequest {
    pub question_index: usize,
    pub answer: String,
}

/// Body of `POST /api/runs/{id}/direct`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectRunRequest {
    pub query: String,
    #[serde(default)]
    pub generate_artifact: Option<bool>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An agent or artifact capability failed or returned malformed output
    #[error("Capability error: {0}")]
    Capability(String),

    /// The request was malformed (bad index, empty query)
    #[error("Invalid input: {0}")]
    Usage(String),

    /// The operation is not valid in the run's current stage
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A run aborted; carries the abort reason to whoever awaits it
    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Usage(_) => StatusCode::BAD_REQUEST,
            AppError::Protocol(_) | AppError::Cancelled(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Capability(_) | AppError::RunFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
