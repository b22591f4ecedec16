use crate::agents::{AgentKind, AgentRegistry};
use crate::llm::{invoke_as, AgentInvoker};
use crate::types::{SearchOutcome, SearchPlanItem};
use std::sync::Arc;

/// Runs a single planned search through the search agent
///
/// Never fails: any capability error is logged and becomes
/// [`SearchOutcome::Absent`]. Retries belong to the invoker.
pub struct SearchRunner {
    agents: Arc<AgentRegistry>,
    invoker: Arc<dyn AgentInvoker>,
}

impl SearchRunner {
    pub fn new(agents: Arc<AgentRegistry>, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { agents, invoker }
    }

    pub async fn execute(&self, item: &SearchPlanItem) -> SearchOutcome {
        if item.query.trim().is_empty() {
            tracing::warn!("Skipping planned search with an empty query");
            return SearchOutcome::Absent;
        }

        let input = format!(
            "Search term: {}\nReason for searching: {}",
            item.query, item.reason
        );
        let agent = self.agents.get(AgentKind::Search);

        match invoke_as::<String>(self.invoker.as_ref(), agent, &input).await {
            Ok(summary) if !summary.trim().is_empty() => SearchOutcome::Success(summary),
            Ok(_) => {
                tracing::warn!(query = %item.query, "Search returned an empty summary");
                SearchOutcome::Absent
            }
            Err(e) => {
                tracing::warn!(query = %item.query, error = %e, "Search failed");
                SearchOutcome::Absent
            }
        }
    }
}
