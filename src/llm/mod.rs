//! Agent invocation
//!
//! - [`AgentInvoker`] - The capability every pipeline stage calls through
//! - [`invoke_as`] - Typed decoding of an agent's output at the call boundary
//! - [`OpenAiCompatibleInvoker`] - HTTP implementation for OpenAI-compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::{invoke_as, OpenAiCompatibleInvoker};
//!
//! let invoker = OpenAiCompatibleInvoker::new("http://localhost:11434/v1", None, timeout)?;
//! let decision: TriageDecision = invoke_as(&invoker, agents.get(AgentKind::Triage), query).await?;
//! ```

/// Invocation trait and typed decoding.
pub mod client;
/// OpenAI-compatible chat completions client.
pub mod openai;

pub use client::{invoke_as, AgentInvoker};
pub use openai::OpenAiCompatibleInvoker;
