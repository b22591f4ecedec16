//! Research pipeline state machine
//!
//! ```text
//! Created → Triaged → (AwaitingClarifications | Planning) → Searching → Writing
//!         → (Done | GeneratingArtifact → Done)
//! ```
//!
//! Stages only move forward. The pipeline performs one stage per
//! [`ResearchPipeline::step`] so the host can publish and persist the run
//! state between stages. Leaving `AwaitingClarifications` is never automatic:
//! the external driver calls [`ResearchPipeline::complete_clarifications`].

use crate::agents::{AgentKind, AgentRegistry};
use crate::llm::{invoke_as, AgentInvoker};
use crate::research::clarification::ClarificationState;
use crate::research::fanout::SearchCoordinator;
use crate::research::search::SearchRunner;
use crate::tools::ArtifactGenerator;
use crate::types::{
    AppError, ArtifactBrief, ArtifactResult, Clarifications, CompletedSearch, ReportData, Result,
    RunEvent,
    RunResult, RunStage, RunStatus, SearchPlan, StartOptions, StylingOptions, TriageDecision,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Aggregate state of one research run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub stage: RunStage,
    pub query: String,
    pub options: StartOptions,
    pub triage: Option<TriageDecision>,
    /// Present only while the run awaits or collects clarifications
    pub clarification: Option<ClarificationState>,
    pub enriched_query: Option<String>,
    pub plan: Option<SearchPlan>,
    pub search_results: Vec<CompletedSearch>,
    pub report: Option<ReportData>,
    pub artifact: Option<ArtifactResult>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, query: impl Into<String>, options: StartOptions) -> Self {
        Self {
            run_id: run_id.into(),
            stage: RunStage::Created,
            query: query.into(),
            options,
            triage: None,
            clarification: None,
            enriched_query: None,
            plan: None,
            search_results: Vec::new(),
            report: None,
            artifact: None,
        }
    }

    /// Move to a later stage
    pub fn advance(&mut self, next: RunStage) -> Result<()> {
        if self.stage.is_terminal() || next.ordinal() <= self.stage.ordinal() {
            return Err(AppError::Protocol(format!(
                "run '{}' cannot move from {} to {}",
                self.run_id, self.stage, next
            )));
        }
        tracing::debug!(run_id = %self.run_id, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        Ok(())
    }

    /// Record a terminal failure outside the forward-only ordering
    pub fn terminate(&mut self, stage: RunStage) {
        if !self.stage.is_terminal() {
            self.stage = stage;
        }
    }

    /// The query the planner and writer work from
    pub fn research_query(&self) -> &str {
        self.enriched_query.as_deref().unwrap_or(&self.query)
    }

    pub fn result(&self) -> Option<RunResult> {
        if self.stage != RunStage::Done {
            return None;
        }
        self.report.clone().map(|report| RunResult {
            report,
            artifact: self.artifact.clone(),
            enriched_query: self.enriched_query.clone(),
        })
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            run_id: self.run_id.clone(),
            stage: self.stage.clone(),
            original_query: self.query.clone(),
            clarification_questions: self
                .clarification
                .as_ref()
                .map(|c| c.question_texts())
                .unwrap_or_default(),
            clarification_responses: self
                .clarification
                .as_ref()
                .map(|c| c.responses())
                .unwrap_or_default(),
            report: self.report.clone(),
            artifact: self.artifact.clone(),
        }
    }
}

/// Title used when neither the configuration nor the artifact agent supplies one
pub const DEFAULT_ARTIFACT_TITLE: &str = "Research Report";

/// Operator settings for the optional artifact stage
///
/// Configured values always win. Whatever is left unset is filled from the
/// artifact agent's [`ArtifactBrief`].
#[derive(Debug, Clone, Default)]
pub struct ArtifactSettings {
    pub title: Option<String>,
    pub styling: Option<StylingOptions>,
}

impl ArtifactSettings {
    /// Whether the artifact agent has anything left to decide
    pub fn needs_brief(&self) -> bool {
        let styling = self.styling.clone().unwrap_or_default();
        self.title.is_none() || styling.font_size.is_none() || styling.primary_color.is_none()
    }

    /// Final title and styling for the generator
    pub fn resolve(&self, brief: Option<ArtifactBrief>) -> (String, Option<StylingOptions>) {
        let brief = brief.unwrap_or_default();
        let title = self
            .title
            .clone()
            .or_else(|| Some(brief.title.trim().to_string()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| DEFAULT_ARTIFACT_TITLE.to_string());

        let configured = self.styling.clone().unwrap_or_default();
        let styling = StylingOptions {
            font_size: configured
                .font_size
                .or(brief.font_size.filter(|size| (8..=24).contains(size))),
            primary_color: configured
                .primary_color
                .or(brief.primary_color.filter(|color| is_hex_color(color))),
        };

        (title, (styling != StylingOptions::default()).then_some(styling))
    }
}

/// `#rgb` or `#rrggbb`; anything else could break out of the style block
fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Runs the stages of a research run against the agent capability
pub struct ResearchPipeline {
    agents: Arc<AgentRegistry>,
    invoker: Arc<dyn AgentInvoker>,
    searches: SearchCoordinator,
    artifacts: Option<Arc<dyn ArtifactGenerator>>,
    artifact_settings: ArtifactSettings,
    events: broadcast::Sender<RunEvent>,
}

impl ResearchPipeline {
    pub fn new(agents: Arc<AgentRegistry>, invoker: Arc<dyn AgentInvoker>) -> Self {
        let (events, _) = broadcast::channel(256);
        let runner = Arc::new(SearchRunner::new(agents.clone(), invoker.clone()));

        Self {
            agents,
            invoker,
            searches: SearchCoordinator::new(runner, events.clone()),
            artifacts: None,
            artifact_settings: ArtifactSettings::default(),
            events,
        }
    }

    pub fn with_artifacts(
        mut self,
        generator: Arc<dyn ArtifactGenerator>,
        settings: ArtifactSettings,
    ) -> Self {
        self.artifacts = Some(generator);
        self.artifact_settings = settings;
        self
    }

    /// Subscribe to stage and search progress events
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    /// Perform the next stage of the run
    pub async fn step(&self, state: &mut RunState, cancel: &CancellationToken) -> Result<()> {
        match state.stage {
            RunStage::Created => self.triage(state).await,
            RunStage::Planning => self.plan(state).await,
            RunStage::Searching => self.search(state, cancel).await,
            RunStage::Writing => self.write(state).await,
            RunStage::GeneratingArtifact => self.generate_artifact(state).await,
            RunStage::Triaged | RunStage::AwaitingClarifications => {
                Err(AppError::Protocol(format!(
                    "run '{}' is {} and needs an external decision to continue",
                    state.run_id, state.stage
                )))
            }
            RunStage::Done | RunStage::Failed { .. } | RunStage::Cancelled => Err(
                AppError::Protocol(format!("run '{}' is already {}", state.run_id, state.stage)),
            ),
        }
    }

    /// Whether [`step`](Self::step) can make progress without external input
    pub fn can_step(state: &RunState) -> bool {
        !state.stage.is_terminal()
            && !matches!(
                state.stage,
                RunStage::Triaged | RunStage::AwaitingClarifications
            )
    }

    /// Triage the query and, when the caller opted in, generate clarifying questions
    pub async fn triage(&self, state: &mut RunState) -> Result<()> {
        if state.stage != RunStage::Created {
            return Err(AppError::Protocol(format!(
                "run '{}' was already triaged",
                state.run_id
            )));
        }

        tracing::info!(run_id = %state.run_id, "Starting clarification check");
        let decision: TriageDecision = invoke_as(
            self.invoker.as_ref(),
            self.agents.get(AgentKind::Triage),
            &state.query,
        )
        .await?;
        tracing::info!(
            run_id = %state.run_id,
            needs_clarification = decision.needs_clarification,
            "Triage decision"
        );

        let wants_questions = decision.needs_clarification && state.options.use_clarifications;
        state.triage = Some(decision);
        state.advance(RunStage::Triaged)?;

        if wants_questions {
            let clarifications: Clarifications = invoke_as(
                self.invoker.as_ref(),
                self.agents.get(AgentKind::Clarifying),
                &state.query,
            )
            .await?;
            let questions: Vec<String> = clarifications
                .questions
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();

            if !questions.is_empty() {
                tracing::info!(run_id = %state.run_id, count = questions.len(), "Awaiting clarifications");
                state.clarification = Some(ClarificationState::new(questions));
                return state.advance(RunStage::AwaitingClarifications);
            }
            tracing::warn!(run_id = %state.run_id, "Clarifying agent asked no questions, proceeding");
        }

        state.advance(RunStage::Planning)
    }

    /// Skip triage entirely and go straight to planning
    pub fn skip_triage(&self, state: &mut RunState) -> Result<()> {
        if state.stage != RunStage::Created {
            return Err(AppError::Protocol(format!(
                "run '{}' has already started",
                state.run_id
            )));
        }
        state.advance(RunStage::Planning)
    }

    /// Close the handshake with whatever answers are present
    pub fn complete_clarifications(&self, state: &mut RunState) -> Result<()> {
        if state.stage != RunStage::AwaitingClarifications {
            return Err(AppError::Protocol(format!(
                "run '{}' is {} and is not awaiting clarifications",
                state.run_id, state.stage
            )));
        }

        let clarification = state.clarification.take().unwrap_or_default();
        let enriched = clarification.enrich_query(&state.query);
        tracing::info!(run_id = %state.run_id, enriched_query = %enriched, "Clarifications complete");

        state.enriched_query = Some(enriched);
        state.advance(RunStage::Planning)
    }

    pub async fn plan(&self, state: &mut RunState) -> Result<()> {
        let query = state.research_query().to_string();
        tracing::info!(run_id = %state.run_id, "Planning searches");

        let plan: SearchPlan = invoke_as(
            self.invoker.as_ref(),
            self.agents.get(AgentKind::Planner),
            &format!("Query: {}", query),
        )
        .await?;
        tracing::info!(run_id = %state.run_id, searches = plan.searches.len(), "Generated search plan");

        state.plan = Some(plan);
        state.advance(RunStage::Searching)
    }

    pub async fn search(&self, state: &mut RunState, cancel: &CancellationToken) -> Result<()> {
        let plan = state.plan.clone().unwrap_or_default();
        state.search_results = self.searches.run(&state.run_id, &plan, cancel).await?;
        state.advance(RunStage::Writing)
    }

    pub async fn write(&self, state: &mut RunState) -> Result<()> {
        tracing::info!(run_id = %state.run_id, results = state.search_results.len(), "Writing research report");

        let summaries: Vec<&str> = state
            .search_results
            .iter()
            .map(|r| r.summary.as_str())
            .collect();
        let input = format!(
            "Original query: {}\nSummarized search results: {}",
            state.research_query(),
            serde_json::to_string(&summaries)
                .map_err(|e| AppError::Internal(format!("Failed to encode results: {}", e)))?
        );

        let report: ReportData = invoke_as(
            self.invoker.as_ref(),
            self.agents.get(AgentKind::Writer),
            &input,
        )
        .await?;
        tracing::info!(run_id = %state.run_id, "Research report completed");

        state.report = Some(report);
        if state.options.generate_artifact {
            state.advance(RunStage::GeneratingArtifact)
        } else {
            state.advance(RunStage::Done)
        }
    }

    /// Ask the artifact agent for a title and styling; a failure only loses the suggestions
    async fn artifact_brief(&self, state: &RunState, markdown: &str) -> Option<ArtifactBrief> {
        if !self.artifact_settings.needs_brief() {
            return None;
        }

        let input = format!("Original query: {}\nReport:\n{}", state.research_query(), markdown);
        match invoke_as::<ArtifactBrief>(
            self.invoker.as_ref(),
            self.agents.get(AgentKind::Artifact),
            &input,
        )
        .await
        {
            Ok(brief) => Some(brief),
            Err(e) => {
                tracing::warn!(run_id = %state.run_id, error = %e, "Artifact agent failed, using configured settings");
                None
            }
        }
    }

    /// Generate the artifact; failures are recorded, never propagated
    pub async fn generate_artifact(&self, state: &mut RunState) -> Result<()> {
        let markdown = state
            .report
            .as_ref()
            .map(|r| r.markdown_report.clone())
            .unwrap_or_default();

        let result = match &self.artifacts {
            None => ArtifactResult::failed("no artifact generator is configured"),
            Some(generator) => {
                let (title, styling) = self
                    .artifact_settings
                    .resolve(self.artifact_brief(state, &markdown).await);
                match generator.generate(&markdown, &title, styling).await {
                    Ok(result) if result.success => result,
                    Ok(result) => ArtifactResult::failed(
                        result
                            .error_message
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| "artifact generation reported failure".to_string()),
                    ),
                    Err(e) => ArtifactResult::failed(e.to_string()),
                }
            }
        };

        match &result.error_message {
            Some(message) if !result.success => {
                tracing::warn!(run_id = %state.run_id, error = %message, "Artifact generation failed")
            }
            _ => tracing::info!(run_id = %state.run_id, path = ?result.file_path, "Artifact generated"),
        }

        state.artifact = Some(result);
        state.advance(RunStage::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentSpec;
    use crate::tools::artifact::MockArtifactGenerator;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StageInvoker {
        needs_clarification: bool,
        questions: Vec<&'static str>,
    }

    #[async_trait]
    impl AgentInvoker for StageInvoker {
        async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
            Ok(match agent.kind {
                AgentKind::Triage => json!({
                    "needs_clarification": self.needs_clarification,
                    "reasoning": "test"
                }),
                AgentKind::Clarifying => json!({ "questions": self.questions }),
                AgentKind::Planner => json!({
                    "searches": [{"query": "q1", "reason": "r1"}]
                }),
                AgentKind::Search => Value::String(format!("found: {}", input.len())),
                AgentKind::Writer => json!({
                    "short_summary": "summary",
                    "markdown_report": "# Report",
                    "follow_up_questions": []
                }),
                AgentKind::Artifact => json!({
                    "title": "Agent Title",
                    "font_size": 11,
                    "primary_color": "#123456"
                }),
            })
        }
    }

    fn pipeline(needs_clarification: bool, questions: Vec<&'static str>) -> ResearchPipeline {
        ResearchPipeline::new(
            Arc::new(AgentRegistry::with_defaults("m")),
            Arc::new(StageInvoker {
                needs_clarification,
                questions,
            }),
        )
    }

    async fn drive(pipeline: &ResearchPipeline, state: &mut RunState) {
        let cancel = CancellationToken::new();
        while ResearchPipeline::can_step(state) {
            pipeline.step(state, &cancel).await.unwrap();
        }
    }

    fn opted_in() -> StartOptions {
        StartOptions {
            use_clarifications: true,
            generate_artifact: false,
        }
    }

    #[test]
    fn test_advance_rejects_backwards_moves() {
        let mut state = RunState::new("r", "q", StartOptions::default());
        state.advance(RunStage::Planning).unwrap();

        assert!(state.advance(RunStage::Triaged).is_err());
        assert!(state.advance(RunStage::Planning).is_err());
        assert_eq!(state.stage, RunStage::Planning);
    }

    #[test]
    fn test_terminate_keeps_first_terminal_stage() {
        let mut state = RunState::new("r", "q", StartOptions::default());
        state.terminate(RunStage::Cancelled);
        state.terminate(RunStage::Failed {
            reason: "late".to_string(),
        });
        assert_eq!(state.stage, RunStage::Cancelled);
    }

    #[tokio::test]
    async fn test_direct_path_reaches_done() {
        let pipeline = pipeline(false, vec![]);
        let mut state = RunState::new("r", "current population of Tokyo", opted_in());

        drive(&pipeline, &mut state).await;

        assert_eq!(state.stage, RunStage::Done);
        assert!(state.clarification.is_none());
        assert_eq!(state.search_results.len(), 1);
        assert!(state.result().is_some());
    }

    #[tokio::test]
    async fn test_clarification_requires_opt_in() {
        let pipeline = pipeline(true, vec!["budget?"]);
        let mut state = RunState::new("r", "best restaurants", StartOptions::default());

        drive(&pipeline, &mut state).await;

        assert_eq!(state.stage, RunStage::Done);
        assert!(state.triage.as_ref().unwrap().needs_clarification);
    }

    #[tokio::test]
    async fn test_triage_suspends_for_clarifications() {
        let pipeline = pipeline(true, vec!["budget?", " ", "cuisine?"]);
        let mut state = RunState::new("r", "best restaurants", opted_in());

        drive(&pipeline, &mut state).await;

        assert_eq!(state.stage, RunStage::AwaitingClarifications);
        assert_eq!(
            state.status().clarification_questions,
            vec!["budget?".to_string(), "cuisine?".to_string()]
        );
        let err = pipeline
            .step(&mut state, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_no_questions_proceeds_to_planning() {
        let pipeline = pipeline(true, vec![]);
        let mut state = RunState::new("r", "best restaurants", opted_in());

        pipeline.triage(&mut state).await.unwrap();

        assert_eq!(state.stage, RunStage::Planning);
    }

    #[tokio::test]
    async fn test_complete_clarifications_builds_enriched_query() {
        let pipeline = pipeline(true, vec!["budget?", "cuisine?"]);
        let mut state = RunState::new("r", "best restaurants in Melbourne", opted_in());
        pipeline.triage(&mut state).await.unwrap();
        state
            .clarification
            .as_mut()
            .unwrap()
            .record(0, "mid-range")
            .unwrap();

        pipeline.complete_clarifications(&mut state).unwrap();

        assert_eq!(state.stage, RunStage::Planning);
        assert!(state.clarification.is_none());
        let enriched = state.enriched_query.as_deref().unwrap();
        assert!(enriched.contains("budget?: mid-range"));
        assert!(enriched.contains("cuisine?: No specific preference"));
        assert_eq!(state.research_query(), enriched);
    }

    #[tokio::test]
    async fn test_complete_clarifications_outside_handshake_is_protocol_error() {
        let pipeline = pipeline(false, vec![]);
        let mut state = RunState::new("r", "q", StartOptions::default());

        let err = pipeline.complete_clarifications(&mut state).unwrap_err();

        assert!(matches!(err, AppError::Protocol(_)));
        assert_eq!(state.stage, RunStage::Created);
    }

    #[tokio::test]
    async fn test_artifact_failure_is_recorded_not_propagated() {
        let mut generator = MockArtifactGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _, _| Err(AppError::Capability("renderer crashed".to_string())));

        let pipeline = pipeline(false, vec![]).with_artifacts(
            Arc::new(generator),
            ArtifactSettings::default(),
        );
        let mut state = RunState::new(
            "r",
            "q",
            StartOptions {
                use_clarifications: false,
                generate_artifact: true,
            },
        );

        drive(&pipeline, &mut state).await;

        assert_eq!(state.stage, RunStage::Done);
        assert!(state.report.is_some());
        let artifact = state.artifact.unwrap();
        assert!(!artifact.success);
        assert!(artifact.error_message.unwrap().contains("renderer crashed"));
    }

    #[tokio::test]
    async fn test_artifact_reported_failure_gets_message() {
        let mut generator = MockArtifactGenerator::new();
        generator.expect_generate().returning(|_, _, _| {
            Ok(ArtifactResult {
                success: false,
                file_path: None,
                error_message: None,
            })
        });

        let pipeline = pipeline(false, vec![]).with_artifacts(
            Arc::new(generator),
            ArtifactSettings::default(),
        );
        let mut state = RunState::new("r", "q", StartOptions::default());
        state.options.generate_artifact = true;
        state.advance(RunStage::Writing).unwrap();
        state.report = None;

        pipeline.write(&mut state).await.unwrap();
        pipeline.generate_artifact(&mut state).await.unwrap();

        let artifact = state.artifact.unwrap();
        assert!(!artifact.success);
        assert!(!artifact.error_message.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_artifact_success_passes_title_and_styling() {
        let mut generator = MockArtifactGenerator::new();
        generator
            .expect_generate()
            .withf(|markdown, title, styling| {
                markdown == "# Report"
                    && title == "Weekly Brief"
                    && styling.as_ref().and_then(|s| s.font_size) == Some(14)
            })
            .returning(|_, _, _| Ok(ArtifactResult::generated("/tmp/weekly-brief.html")));

        let settings = ArtifactSettings {
            title: Some("Weekly Brief".to_string()),
            styling: Some(StylingOptions {
                font_size: Some(14),
                primary_color: None,
            }),
        };
        let pipeline = pipeline(false, vec![]).with_artifacts(Arc::new(generator), settings);
        let mut state = RunState::new(
            "r",
            "q",
            StartOptions {
                use_clarifications: false,
                generate_artifact: true,
            },
        );

        drive(&pipeline, &mut state).await;

        let result = state.result().unwrap();
        assert_eq!(
            result.artifact.unwrap().file_path.as_deref(),
            Some("/tmp/weekly-brief.html")
        );
    }

    #[tokio::test]
    async fn test_artifact_agent_fills_unset_settings() {
        let mut generator = MockArtifactGenerator::new();
        generator
            .expect_generate()
            .withf(|_, title, styling| {
                title == "Agent Title"
                    && styling.as_ref().and_then(|s| s.font_size) == Some(13)
                    && styling.as_ref().and_then(|s| s.primary_color.as_deref()) == Some("#123456")
            })
            .times(1)
            .returning(|_, _, _| Ok(ArtifactResult::generated("/tmp/agent-title.html")));

        let settings = ArtifactSettings {
            title: None,
            styling: Some(StylingOptions {
                font_size: Some(13),
                primary_color: None,
            }),
        };
        let pipeline = pipeline(false, vec![]).with_artifacts(Arc::new(generator), settings);
        let mut state = RunState::new("r", "q", StartOptions::default());
        state.options.generate_artifact = true;
        state.advance(RunStage::Writing).unwrap();

        pipeline.write(&mut state).await.unwrap();
        pipeline.generate_artifact(&mut state).await.unwrap();

        assert!(state.artifact.unwrap().success);
    }

    #[test]
    fn test_resolve_ignores_unsafe_brief_values() {
        let settings = ArtifactSettings::default();
        let brief = ArtifactBrief {
            title: "   ".to_string(),
            font_size: Some(90),
            primary_color: Some("red;}</style><script>".to_string()),
        };

        let (title, styling) = settings.resolve(Some(brief));
        assert_eq!(title, DEFAULT_ARTIFACT_TITLE);
        assert!(styling.is_none());
    }

    #[test]
    fn test_fully_configured_settings_skip_the_agent() {
        let settings = ArtifactSettings {
            title: Some("Fixed".to_string()),
            styling: Some(StylingOptions {
                font_size: Some(12),
                primary_color: Some("#fff".to_string()),
            }),
        };
        assert!(!settings.needs_brief());
        assert!(ArtifactSettings::default().needs_brief());

        let (title, _) = settings.resolve(Some(ArtifactBrief {
            title: "Ignored".to_string(),
            ..Default::default()
        }));
        assert_eq!(title, "Fixed");
    }
}
