//! OpenAI-compatible agent invoker
//!
//! Calls `POST {base_url}/chat/completions`, which OpenAI, Ollama, vLLM and
//! most hosted gateways accept. Structured agents request JSON mode and have
//! their reply parsed as JSON. Agents with tools get the registered tool
//! definitions and run a tool-call loop until the model answers in text.

use crate::agents::{AgentSpec, OutputSchema};
use crate::llm::client::AgentInvoker;
use crate::tools::{ToolDefinition, ToolRegistry};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Model round-trips allowed before an agent run is abandoned
const MAX_TOOL_ROUNDS: usize = 6;
const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiCompatibleInvoker {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    tools: Arc<ToolRegistry>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

impl OpenAiCompatibleInvoker {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            tools: Arc::new(ToolRegistry::new()),
        })
    }

    /// Tools agents may call, looked up by the names in [`AgentSpec::tools`]
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    fn request_body(agent: &AgentSpec, messages: &[Value], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": agent.model,
            "messages": messages,
        });

        if agent.output.is_structured() {
            body["response_format"] = json!({"type": "json_object"});
        }
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }

        body
    }

    async fn complete(&self, agent: &AgentSpec, body: &Value) -> Result<ChoiceMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Capability(format!("{} request failed: {}", agent.name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Capability(format!(
                "{} returned HTTP {}: {}",
                agent.name, status, body
            )));
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            AppError::Capability(format!("{} returned an unreadable response: {}", agent.name, e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AppError::Capability(format!("{} returned no content", agent.name)))
    }

    /// Run one tool call; failures are reported back to the model as an error object
    async fn run_tool(&self, agent: &AgentSpec, call: &WireToolCall) -> String {
        let name = &call.function.name;
        let outcome = if !agent.tools.iter().any(|t| t == name) {
            Err(AppError::Usage(format!("tool '{}' is not available to {}", name, agent.name)))
        } else {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Err(e) => Err(AppError::Usage(format!("invalid arguments for {}: {}", name, e))),
                Ok(args) => match tokio::time::timeout(TOOL_TIMEOUT, self.tools.execute(name, args)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Capability(format!("{} timed out", name))),
                },
            }
        };

        match outcome {
            Ok(value) => {
                tracing::debug!(agent = %agent.name, tool = %name, "Tool call succeeded");
                value.to_string()
            }
            Err(e) => {
                tracing::warn!(agent = %agent.name, tool = %name, error = %e, "Tool call failed");
                json!({"error": e.to_string()}).to_string()
            }
        }
    }

    fn finish(agent: &AgentSpec, content: Option<String>) -> Result<Value> {
        let content = content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Capability(format!("{} returned no content", agent.name)))?;

        match agent.output {
            OutputSchema::Text => Ok(Value::String(content)),
            OutputSchema::Json(_) => parse_json_content(&content).map_err(|e| {
                AppError::Capability(format!("{} returned invalid JSON: {}", agent.name, e))
            }),
        }
    }
}

/// Parse a model reply as JSON, tolerating a surrounding markdown code fence
fn parse_json_content(content: &str) -> std::result::Result<Value, serde_json::Error> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim())
}

#[async_trait]
impl AgentInvoker for OpenAiCompatibleInvoker {
    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
        let tools = self.tools.definitions_for(&agent.tools);
        let mut messages = vec![
            json!({"role": "system", "content": agent.system_prompt()}),
            json!({"role": "user", "content": input}),
        ];

        tracing::debug!(agent = %agent.name, model = %agent.model, tools = tools.len(), "Invoking agent");

        for round in 0..MAX_TOOL_ROUNDS {
            let message = self
                .complete(agent, &Self::request_body(agent, &messages, &tools))
                .await?;

            if message.tool_calls.is_empty() {
                return Self::finish(agent, message.content);
            }

            tracing::debug!(agent = %agent.name, round, calls = message.tool_calls.len(), "Model requested tools");
            messages.push(json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": message.tool_calls,
            }));
            for call in &message.tool_calls {
                let result = self.run_tool(agent, call).await;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": result,
                }));
            }
        }

        Err(AppError::Capability(format!(
            "{} did not answer within {} tool rounds",
            agent.name, MAX_TOOL_ROUNDS
        )))
    }
}
