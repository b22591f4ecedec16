//! Research agents
//!
//! Each pipeline stage talks to one agent. An agent is an immutable
//! [`AgentSpec`] value handed to the invocation capability at the call site;
//! the full set is built once at startup by the [`AgentRegistry`].

pub mod registry;

use crate::types::{ArtifactBrief, Clarifications, ReportData, SearchPlan, TriageDecision};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use registry::AgentRegistry;

/// The agents used by the research pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Triage,
    Clarifying,
    Planner,
    Search,
    Writer,
    Artifact,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Triage,
        AgentKind::Clarifying,
        AgentKind::Planner,
        AgentKind::Search,
        AgentKind::Writer,
        AgentKind::Artifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Triage => "triage",
            AgentKind::Clarifying => "clarifying",
            AgentKind::Planner => "planner",
            AgentKind::Search => "search",
            AgentKind::Writer => "writer",
            AgentKind::Artifact => "artifact",
        }
    }

    /// Expected output of this agent
    pub fn output_schema(&self) -> OutputSchema {
        match self {
            AgentKind::Triage => OutputSchema::of::<TriageDecision>(),
            AgentKind::Clarifying => OutputSchema::of::<Clarifications>(),
            AgentKind::Planner => OutputSchema::of::<SearchPlan>(),
            AgentKind::Search => OutputSchema::Text,
            AgentKind::Writer => OutputSchema::of::<ReportData>(),
            AgentKind::Artifact => OutputSchema::of::<ArtifactBrief>(),
        }
    }

    /// Built-in instructions used when the configuration has no override
    pub fn default_instructions(&self) -> &'static str {
        match self {
            AgentKind::Triage => {
                "You decide whether a research query is specific enough to research directly. \
Set needs_clarification to true when the query is broad, uses vague criteria such as \
\"best\" or \"good\", depends on unstated preferences (budget, timing, location, purpose) \
or has several plausible readings. Factual lookups with a clear answer do not need \
clarification. Explain the decision in reasoning."
            }
            AgentKind::Clarifying => {
                "Write 2-3 short, friendly clarifying questions that would most improve research \
on the user's query. Only ask for information the user has not already given."
            }
            AgentKind::Planner => {
                "You plan web research. Given a query, produce 5-10 web searches that together \
answer it. For each search give the search term and the reason it is needed."
            }
            AgentKind::Search => {
                "You are a research assistant. Given a search term, search the web and write a \
concise summary of the results: 1-2 paragraphs, under 250 words, main points only. \
Output only the summary."
            }
            AgentKind::Writer => {
                "You are a senior researcher writing a thorough report for a research query. \
You receive the query and summaries of initial searches. Outline the report first, then \
write it in markdown with an introduction, detailed sections, evidence and conclusions. \
Also give a 2-3 sentence summary and follow-up research questions."
            }
            AgentKind::Artifact => {
                "You prepare markdown research reports for publication. Read the report and \
choose a concise title that names its subject, a body font size between 10 and 14 points \
and a dark accent color as a CSS hex value that suits the topic."
            }
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown agent '{}'", s))
    }
}

/// Shape of the output an agent must return
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSchema {
    /// Free text
    Text,
    /// A JSON object matching the given JSON schema
    Json(serde_json::Value),
}

impl OutputSchema {
    pub fn of<T: JsonSchema>() -> Self {
        OutputSchema::Json(schemars::schema_for!(T).to_value())
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, OutputSchema::Json(_))
    }
}

/// Immutable configuration of one agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub kind: AgentKind,
    pub model: String,
    pub instructions: String,
    pub output: OutputSchema,
    /// Names of tools the agent may call
    pub tools: Vec<String>,
}

impl AgentSpec {
    pub fn new(kind: AgentKind, model: impl Into<String>, instructions: impl Into<String>) -> Self {
        let tools = match kind {
            AgentKind::Search => vec!["web_search".to_string()],
            _ => Vec::new(),
        };

        Self {
            name: format!("{}-agent", kind.as_str()),
            kind,
            model: model.into(),
            instructions: instructions.into(),
            output: kind.output_schema(),
            tools,
        }
    }

    /// System prompt sent to the model, including the output contract
    pub fn system_prompt(&self) -> String {
        match &self.output {
            OutputSchema::Text => self.instructions.clone(),
            OutputSchema::Json(schema) => format!(
                "{}\n\nRespond only with a JSON object that matches this JSON schema:\n{}",
                self.instructions, schema
            ),
        }
    }
}
