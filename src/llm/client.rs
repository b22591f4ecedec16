//! Agent invocation abstraction
//!
//! The pipeline never talks to a model provider directly. It hands an
//! [`AgentSpec`] and a prompt to an [`AgentInvoker`] and decodes the returned
//! JSON into the stage's expected type with [`invoke_as`].

use crate::agents::AgentSpec;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Capability that runs one agent call
///
/// Implementations fail with [`AppError::Capability`] on timeouts, upstream
/// errors or malformed responses. Text agents return a JSON string value,
/// structured agents a JSON object.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<serde_json::Value>;
}

/// Invoke an agent and validate its output against `T`
pub async fn invoke_as<T: DeserializeOwned>(
    invoker: &dyn AgentInvoker,
    agent: &AgentSpec,
    input: &str,
) -> Result<T> {
    let value = invoker.invoke(agent, input).await?;

    serde_json::from_value(value).map_err(|e| {
        AppError::Capability(format!(
            "{} returned output that does not match its schema: {}",
            agent.name, e
        ))
    })
}
