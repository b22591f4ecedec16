use crate::research::search::SearchRunner;
use crate::types::{AppError, CompletedSearch, Result, RunEvent, SearchOutcome, SearchPlan};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fans a search plan out into concurrent search tasks and folds the
/// successful results back in completion order
pub struct SearchCoordinator {
    runner: Arc<SearchRunner>,
    events: broadcast::Sender<RunEvent>,
}

impl SearchCoordinator {
    pub fn new(runner: Arc<SearchRunner>, events: broadcast::Sender<RunEvent>) -> Self {
        Self { runner, events }
    }

    /// Run every search in the plan concurrently
    ///
    /// Returns only successful searches, in the order they finished. The
    /// batch is done when every task has completed; absent results are
    /// dropped, so the returned list may be empty. Cancellation aborts the
    /// pending tasks and discards whatever already completed.
    pub async fn run(
        &self,
        run_id: &str,
        plan: &SearchPlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<CompletedSearch>> {
        let total = plan.searches.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        tracing::info!(run_id, total, "Performing web searches");

        let mut set = JoinSet::new();
        for (plan_index, item) in plan.searches.iter().cloned().enumerate() {
            let runner = Arc::clone(&self.runner);
            set.spawn(async move {
                let outcome = runner.execute(&item).await;
                (plan_index, item.query, outcome)
            });
        }

        let mut completed = 0;
        let mut results = Vec::new();

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    set.abort_all();
                    tracing::warn!(
                        run_id,
                        completed,
                        total,
                        "Search batch cancelled, discarding partial results"
                    );
                    return Err(AppError::Cancelled(format!(
                        "search batch cancelled after {}/{} searches",
                        completed, total
                    )));
                }
                joined = set.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };
            completed += 1;

            match joined {
                Ok((plan_index, query, SearchOutcome::Success(summary))) => {
                    results.push(CompletedSearch {
                        plan_index,
                        query,
                        summary,
                    });
                }
                Ok((_, query, SearchOutcome::Absent)) => {
                    tracing::debug!(run_id, query = %query, "Search produced no result");
                }
                Err(e) => {
                    tracing::warn!(run_id, error = %e, "Search task did not complete");
                }
            }

            tracing::info!(run_id, completed, total, "Completed search {}/{}", completed, total);
            // Nobody listening is fine.
            let _ = self.events.send(RunEvent::SearchProgress {
                run_id: run_id.to_string(),
                completed,
                total,
            });
        }

        tracing::info!(
            run_id,
            results = results.len(),
            "Completed all searches"
        );
        Ok(results)
    }
}
