//! Mock implementations for testing.
//!
//! [`ScriptedInvoker`] answers every agent kind with a scripted response so
//! whole research runs can execute without a model endpoint.

use async_trait::async_trait;
use delve::agents::{AgentKind, AgentRegistry, AgentSpec};
use delve::llm::AgentInvoker;
use delve::types::{AppError, Result};
use delve::{ResearchHost, ResearchPipeline};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;

fn responder<F>(f: F) -> Responder
where
    F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Agent invoker with one scripted responder per agent kind.
///
/// Defaults:
/// - triage: no clarification needed
/// - clarifying: no questions
/// - planner: three searches
/// - search: summarizes the term; terms containing "fail" error
/// - writer: a report whose summary counts the results it was given
/// - artifact: a brief titled "Scripted Brief"
pub struct ScriptedInvoker {
    responders: HashMap<AgentKind, Responder>,
    calls: Mutex<Vec<(AgentKind, String)>>,
    search_delay: Duration,
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        let mut responders: HashMap<AgentKind, Responder> = HashMap::new();
        responders.insert(
            AgentKind::Triage,
            responder(|_| Ok(json!({ "needs_clarification": false, "reasoning": "specific" }))),
        );
        responders.insert(
            AgentKind::Clarifying,
            responder(|_| Ok(json!({ "questions": [] }))),
        );
        responders.insert(
            AgentKind::Planner,
            responder(|_| Ok(plan(&["first", "second", "third"]))),
        );
        responders.insert(
            AgentKind::Search,
            responder(|input| {
                let term = search_term(input);
                if term.contains("fail") {
                    Err(AppError::Capability(format!("search for '{}' timed out", term)))
                } else {
                    Ok(Value::String(format!("summary of {}", term)))
                }
            }),
        );
        responders.insert(
            AgentKind::Writer,
            responder(|input| {
                let results = writer_results(input);
                Ok(json!({
                    "short_summary": format!("{} sources", results.len()),
                    "markdown_report": format!("# Report\n\n{}", results.join("\n")),
                    "follow_up_questions": ["What changed since?"]
                }))
            }),
        );
        responders.insert(
            AgentKind::Artifact,
            responder(|_| Ok(json!({ "title": "Scripted Brief", "font_size": 12 }))),
        );

        Self {
            responders,
            calls: Mutex::new(Vec::new()),
            search_delay: Duration::ZERO,
        }
    }

    /// Replace the responder for one agent kind
    pub fn on<F>(mut self, kind: AgentKind, responder: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.responders.insert(kind, Box::new(responder));
        self
    }

    /// Always reply with `value`
    pub fn reply(self, kind: AgentKind, value: Value) -> Self {
        self.on(kind, move |_| Ok(value.clone()))
    }

    /// Always fail with a capability error
    pub fn fail(self, kind: AgentKind, message: &str) -> Self {
        let message = message.to_string();
        self.on(kind, move |_| Err(AppError::Capability(message.clone())))
    }

    /// Triage asks for clarification and the clarifying agent asks `questions`
    pub fn clarifying(self, questions: &[&str]) -> Self {
        self.reply(
            AgentKind::Triage,
            json!({ "needs_clarification": true, "reasoning": "too broad" }),
        )
        .reply(AgentKind::Clarifying, json!({ "questions": questions }))
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    /// Inputs the given agent kind was invoked with, in call order
    pub fn calls(&self, kind: AgentKind) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, input)| input.clone())
            .collect()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
        self.calls.lock().push((agent.kind, input.to_string()));
        if agent.kind == AgentKind::Search && !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }

        match self.responders.get(&agent.kind) {
            Some(responder) => responder(input),
            None => Err(AppError::Capability(format!("no script for {}", agent.name))),
        }
    }
}

/// A planner reply with one search per term
pub fn plan(terms: &[&str]) -> Value {
    let searches: Vec<Value> = terms
        .iter()
        .map(|term| json!({ "query": term, "reason": format!("learn about {}", term) }))
        .collect();
    json!({ "searches": searches })
}

fn search_term(input: &str) -> String {
    input
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Search term: "))
        .unwrap_or_default()
        .to_string()
}

fn writer_results(input: &str) -> Vec<String> {
    input
        .split_once("Summarized search results: ")
        .and_then(|(_, results)| serde_json::from_str(results).ok())
        .unwrap_or_default()
}

/// A run host around `invoker` with default agents
pub fn host(invoker: Arc<ScriptedInvoker>) -> ResearchHost {
    ResearchHost::new(Arc::new(ResearchPipeline::new(
        Arc::new(AgentRegistry::with_defaults("test-model")),
        invoker,
    )))
}
