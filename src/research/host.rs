//! Run host
//!
//! Owns every run by its caller-chosen id and routes external operations to
//! it. Each run is driven on its own task so a dropped caller never strands
//! a run halfway through a stage; callers await the drive and read the
//! resulting snapshot.

use crate::db::RunStore;
use crate::research::pipeline::{ResearchPipeline, RunState};
use crate::types::{AppError, Result, RunEvent, RunResult, RunStage, RunStatus, StartOptions};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunSlot {
    /// Held for the whole of a drive; external operations wait on it
    state: Mutex<RunState>,
    /// Latest published state, readable without waiting on a drive
    snapshot: watch::Sender<RunState>,
    cancel: CancellationToken,
}

impl RunSlot {
    fn new(state: RunState) -> Arc<Self> {
        let (snapshot, _) = watch::channel(state.clone());
        Arc::new(Self {
            state: Mutex::new(state),
            snapshot,
            cancel: CancellationToken::new(),
        })
    }

    fn current(&self) -> RunState {
        self.snapshot.borrow().clone()
    }
}

pub struct ResearchHost {
    pipeline: Arc<ResearchPipeline>,
    runs: RwLock<HashMap<String, Arc<RunSlot>>>,
    store: Option<Arc<dyn RunStore>>,
}

impl ResearchHost {
    pub fn new(pipeline: Arc<ResearchPipeline>) -> Self {
        Self {
            pipeline,
            runs: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Persist every state transition to `store`
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.pipeline.subscribe()
    }

    /// Start a run: triage it, then either suspend for clarifications or
    /// drive it to `Done`
    ///
    /// Repeating the start of a run that is awaiting clarifications with the
    /// same query returns its current status.
    pub async fn start_research(
        &self,
        run_id: &str,
        query: &str,
        options: StartOptions,
    ) -> Result<RunStatus> {
        validate_query(query)?;

        let slot = match self.insert(run_id, query, options) {
            Ok(slot) => slot,
            Err(existing) => {
                let current = existing.current();
                if current.stage == RunStage::AwaitingClarifications && current.query == query {
                    tracing::debug!(run_id, "Repeated start for a run awaiting clarifications");
                    return Ok(current.status());
                }
                return Err(AppError::Protocol(format!(
                    "run '{}' already exists and is {}",
                    run_id, current.stage
                )));
            }
        };

        tracing::info!(run_id, query, "Starting research run");
        self.persist(&slot.current()).await;
        self.drive(slot.clone()).await?;

        let state = slot.current();
        ensure_not_aborted(&state)?;
        Ok(state.status())
    }

    /// Record the answer for one clarification question
    pub async fn provide_single_clarification(
        &self,
        run_id: &str,
        question_index: usize,
        answer: &str,
    ) -> Result<RunStatus> {
        let slot = self.started_slot(run_id)?;
        let mut state = slot.state.lock().await;
        ensure_live(&state)?;
        if state.stage != RunStage::AwaitingClarifications {
            return Err(AppError::Protocol(format!(
                "run '{}' is {} and is not accepting clarifications",
                run_id, state.stage
            )));
        }

        state
            .clarification
            .get_or_insert_with(Default::default)
            .record(question_index, answer)?;
        tracing::info!(run_id, question_index, "Recorded clarification");

        self.publish(&slot, &state).await;
        Ok(state.status())
    }

    /// Proceed with whatever answers are present and drive the run to `Done`
    pub async fn complete_clarifications(&self, run_id: &str) -> Result<RunResult> {
        let slot = self.started_slot(run_id)?;
        {
            let mut state = slot.state.lock().await;
            ensure_live(&state)?;
            self.pipeline.complete_clarifications(&mut state)?;
            self.publish(&slot, &state).await;
        }

        self.drive(slot.clone()).await?;
        outcome(&slot.current())
    }

    /// Non-interactive path: no triage, straight to planning
    pub async fn run_direct(
        &self,
        run_id: &str,
        query: &str,
        generate_artifact: bool,
    ) -> Result<RunResult> {
        validate_query(query)?;
        let options = StartOptions {
            use_clarifications: false,
            generate_artifact,
        };

        let slot = self.insert(run_id, query, options).map_err(|existing| {
            AppError::Protocol(format!(
                "run '{}' already exists and is {}",
                run_id,
                existing.current().stage
            ))
        })?;

        tracing::info!(run_id, query, "Starting direct research run");
        {
            let mut state = slot.state.lock().await;
            self.pipeline.skip_triage(&mut state)?;
            self.publish(&slot, &state).await;
        }

        self.drive(slot.clone()).await?;
        outcome(&slot.current())
    }

    pub fn status(&self, run_id: &str) -> Result<RunStatus> {
        Ok(self.slot(run_id)?.current().status())
    }

    /// Resolve once the run reaches a terminal stage
    pub async fn wait_for_result(&self, run_id: &str) -> Result<RunResult> {
        let slot = self.slot(run_id)?;
        let mut rx = slot.snapshot.subscribe();
        let state = rx
            .wait_for(|state| state.stage.is_terminal())
            .await
            .map_err(|e| AppError::Internal(format!("Run '{}' snapshot closed: {}", run_id, e)))?
            .clone();
        outcome(&state)
    }

    /// Cancel in-flight work and mark the run `Cancelled`
    pub async fn cancel(&self, run_id: &str) -> Result<RunStatus> {
        let slot = self.slot(run_id)?;
        ensure_live(&slot.current())?;

        slot.cancel.cancel();
        // A drive in progress notices the token and releases the lock.
        let mut state = slot.state.lock().await;
        if !state.stage.is_terminal() {
            state.terminate(RunStage::Cancelled);
            self.publish(&slot, &state).await;
        }
        tracing::info!(run_id, "Run cancelled");
        Ok(state.status())
    }

    /// Reload runs from the store and resume the ones that can progress on
    /// their own
    ///
    /// Terminal runs come back inert so their ids stay taken: they answer
    /// status queries and reject late operations. Returns how many runs were
    /// restored.
    pub async fn restore(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let mut restored = 0;
        for state in store.load_all().await? {
            let run_id = state.run_id.clone();
            let resumable = ResearchPipeline::can_step(&state);
            let slot = RunSlot::new(state);
            {
                let mut runs = self.runs.write();
                if runs.contains_key(&run_id) {
                    continue;
                }
                runs.insert(run_id.clone(), slot.clone());
            }

            tracing::debug!(run_id = %run_id, stage = %slot.current().stage, resumable, "Restored run");
            if resumable {
                // Runs nobody is waiting on finish in the background.
                let _handle = self.spawn_drive(slot);
            }
            restored += 1;
        }
        Ok(restored)
    }

    fn slot(&self, run_id: &str) -> Result<Arc<RunSlot>> {
        self.runs
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("run '{}'", run_id)))
    }

    /// Like [`slot`](Self::slot), for handshake operations that are only valid after a start
    fn started_slot(&self, run_id: &str) -> Result<Arc<RunSlot>> {
        self.slot(run_id).map_err(|_| {
            AppError::Protocol(format!("run '{}' has not been started", run_id))
        })
    }

    /// Register a new run, or hand back the existing slot for this id
    fn insert(
        &self,
        run_id: &str,
        query: &str,
        options: StartOptions,
    ) -> std::result::Result<Arc<RunSlot>, Arc<RunSlot>> {
        let mut runs = self.runs.write();
        if let Some(existing) = runs.get(run_id) {
            return Err(existing.clone());
        }
        let slot = RunSlot::new(RunState::new(run_id, query.trim(), options));
        runs.insert(run_id.to_string(), slot.clone());
        Ok(slot)
    }

    async fn publish(&self, slot: &RunSlot, state: &RunState) {
        publish_state(&self.pipeline, self.store.as_deref(), slot, state).await;
    }

    async fn persist(&self, state: &RunState) {
        persist_state(self.store.as_deref(), state).await;
    }

    async fn drive(&self, slot: Arc<RunSlot>) -> Result<()> {
        self.spawn_drive(slot)
            .await
            .map_err(|e| AppError::Internal(format!("Run task failed: {}", e)))
    }

    fn spawn_drive(&self, slot: Arc<RunSlot>) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let store = self.store.clone();
        tokio::spawn(async move { drive_run(pipeline, store, slot).await })
    }
}

/// Step the run until it needs external input or reaches a terminal stage
async fn drive_run(
    pipeline: Arc<ResearchPipeline>,
    store: Option<Arc<dyn RunStore>>,
    slot: Arc<RunSlot>,
) {
    let mut state = slot.state.lock().await;

    while ResearchPipeline::can_step(&state) {
        let stage = state.stage.clone();
        let stepped = if slot.cancel.is_cancelled() {
            Err(AppError::Cancelled(format!("run cancelled before {}", stage)))
        } else {
            tokio::select! {
                biased;
                _ = slot.cancel.cancelled() => {
                    Err(AppError::Cancelled(format!("run cancelled during {}", stage)))
                }
                stepped = pipeline.step(&mut state, &slot.cancel) => stepped,
            }
        };

        if let Err(e) = stepped {
            match e {
                AppError::Cancelled(reason) => {
                    tracing::warn!(run_id = %state.run_id, reason = %reason, "Run cancelled");
                    state.terminate(RunStage::Cancelled);
                }
                other => {
                    tracing::error!(run_id = %state.run_id, stage = %state.stage, error = %other, "Run failed");
                    state.terminate(RunStage::Failed {
                        reason: other.to_string(),
                    });
                }
            }
        }

        publish_state(&pipeline, store.as_deref(), &slot, &state).await;
    }
}

async fn publish_state(
    pipeline: &ResearchPipeline,
    store: Option<&dyn RunStore>,
    slot: &RunSlot,
    state: &RunState,
) {
    slot.snapshot.send_replace(state.clone());
    pipeline.publish(RunEvent::StageChanged {
        run_id: state.run_id.clone(),
        stage: state.stage.clone(),
    });
    persist_state(store, state).await;
}

async fn persist_state(store: Option<&dyn RunStore>, state: &RunState) {
    if let Some(store) = store {
        if let Err(e) = store.save(state).await {
            tracing::warn!(run_id = %state.run_id, error = %e, "Failed to persist run state");
        }
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(AppError::Usage("query must not be empty".to_string()));
    }
    Ok(())
}

/// Reject operations addressed to a finished run
fn ensure_live(state: &RunState) -> Result<()> {
    if state.stage.is_terminal() {
        return Err(AppError::Protocol(format!(
            "run '{}' is already {}",
            state.run_id, state.stage
        )));
    }
    Ok(())
}

fn ensure_not_aborted(state: &RunState) -> Result<()> {
    match &state.stage {
        RunStage::Failed { reason } => Err(AppError::RunFailed(reason.clone())),
        RunStage::Cancelled => Err(AppError::Cancelled(format!("run '{}'", state.run_id))),
        _ => Ok(()),
    }
}

fn outcome(state: &RunState) -> Result<RunResult> {
    ensure_not_aborted(state)?;
    state.result().ok_or_else(|| {
        AppError::Protocol(format!(
            "run '{}' is {} and has no result yet",
            state.run_id, state.stage
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentKind, AgentRegistry, AgentSpec};
    use crate::db::MockRunStore;
    use crate::llm::AgentInvoker;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Triage asks for clarification on queries containing "restaurants"
    struct TopicInvoker;

    #[async_trait]
    impl AgentInvoker for TopicInvoker {
        async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
            Ok(match agent.kind {
                AgentKind::Triage => json!({
                    "needs_clarification": input.contains("restaurants"),
                    "reasoning": ""
                }),
                AgentKind::Clarifying => json!({ "questions": ["budget?", "cuisine?"] }),
                AgentKind::Planner => json!({ "searches": [{"query": "a", "reason": "b"}] }),
                AgentKind::Search => Value::String("result".to_string()),
                AgentKind::Writer => json!({
                    "short_summary": "s",
                    "markdown_report": "# r",
                    "follow_up_questions": []
                }),
                AgentKind::Artifact => json!({ "title": "Brief" }),
            })
        }
    }

    fn host() -> ResearchHost {
        ResearchHost::new(Arc::new(ResearchPipeline::new(
            Arc::new(AgentRegistry::with_defaults("m")),
            Arc::new(TopicInvoker),
        )))
    }

    fn interactive() -> StartOptions {
        StartOptions {
            use_clarifications: true,
            generate_artifact: false,
        }
    }

    #[tokio::test]
    async fn test_start_without_clarification_completes() {
        let host = host();
        let status = host
            .start_research("r1", "population of Tokyo", interactive())
            .await
            .unwrap();

        assert_eq!(status.stage, RunStage::Done);
        assert!(status.clarification_questions.is_empty());
        assert!(status.report.is_some());
    }

    #[tokio::test]
    async fn test_empty_query_is_usage_error() {
        let err = host()
            .start_research("r1", "   ", interactive())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let host = host();
        assert!(matches!(host.status("nope"), Err(AppError::NotFound(_))));
        assert!(matches!(host.cancel("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_handshake_before_start_is_protocol_error() {
        let host = host();
        assert!(matches!(
            host.provide_single_clarification("nope", 0, "x").await,
            Err(AppError::Protocol(msg)) if msg.contains("not been started")
        ));
        assert!(matches!(
            host.complete_clarifications("nope").await,
            Err(AppError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_start_returns_current_status() {
        let host = host();
        host.start_research("r1", "best restaurants", interactive())
            .await
            .unwrap();
        host.provide_single_clarification("r1", 1, "thai")
            .await
            .unwrap();

        let again = host
            .start_research("r1", "best restaurants", interactive())
            .await
            .unwrap();
        assert_eq!(again.stage, RunStage::AwaitingClarifications);
        assert_eq!(again.clarification_responses.get(&1).map(String::as_str), Some("thai"));

        let err = host
            .start_research("r1", "something else", interactive())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_clarifications() {
        let host = host();
        host.start_research("r1", "best restaurants", interactive())
            .await
            .unwrap();

        let status = host.cancel("r1").await.unwrap();

        assert_eq!(status.stage, RunStage::Cancelled);
        assert!(matches!(
            host.wait_for_result("r1").await,
            Err(AppError::Cancelled(_))
        ));
        assert!(matches!(
            host.complete_clarifications("r1").await,
            Err(AppError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_late_operations_on_done_run_are_rejected() {
        let host = host();
        host.run_direct("r1", "population of Tokyo", false)
            .await
            .unwrap();

        assert!(matches!(
            host.provide_single_clarification("r1", 0, "x").await,
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(host.cancel("r1").await, Err(AppError::Protocol(_))));
        assert!(matches!(
            host.run_direct("r1", "population of Tokyo", false).await,
            Err(AppError::Protocol(_))
        ));
        assert!(host.wait_for_result("r1").await.is_ok());
    }

    #[tokio::test]
    async fn test_every_transition_is_persisted() {
        let saved = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = saved.clone();
        let mut store = MockRunStore::new();
        store.expect_save().returning(move |state| {
            recorder.lock().push(state.stage.clone());
            Ok(())
        });

        let host = host().with_store(Arc::new(store));
        host.start_research("r1", "best restaurants", interactive())
            .await
            .unwrap();
        host.provide_single_clarification("r1", 0, "cheap")
            .await
            .unwrap();

        let saved = saved.lock();
        assert_eq!(saved.first(), Some(&RunStage::Created));
        assert_eq!(saved.last(), Some(&RunStage::AwaitingClarifications));
        assert!(saved.len() >= 3);
    }

    #[tokio::test]
    async fn test_restore_resumes_interrupted_runs() {
        let mut waiting = RunState::new("waiting", "best restaurants", interactive());
        waiting.advance(RunStage::Triaged).unwrap();
        waiting.advance(RunStage::AwaitingClarifications).unwrap();
        waiting.clarification = Some(crate::research::ClarificationState::new(["budget?"]));

        let mut planning = RunState::new("planning", "population of Tokyo", interactive());
        planning.advance(RunStage::Planning).unwrap();

        let mut finished = RunState::new("finished", "q", interactive());
        finished.terminate(RunStage::Cancelled);

        let mut store = MockRunStore::new();
        store
            .expect_load_all()
            .times(1)
            .return_once(move || Ok(vec![waiting, planning, finished]));
        store.expect_save().returning(|_| Ok(()));

        let host = host().with_store(Arc::new(store));
        assert_eq!(host.restore().await.unwrap(), 3);

        let result = host.wait_for_result("planning").await.unwrap();
        assert_eq!(result.report.short_summary, "s");
        assert_eq!(
            host.status("waiting").unwrap().clarification_questions,
            vec!["budget?".to_string()]
        );
        assert_eq!(host.status("finished").unwrap().stage, RunStage::Cancelled);
        assert!(matches!(
            host.start_research("finished", "q", interactive()).await,
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(
            host.wait_for_result("finished").await,
            Err(AppError::Cancelled(_))
        ));
    }
}
