//! Agent Registry
//!
//! Builds the fixed set of research agents from configuration. Built-in
//! instructions and the default model apply unless `[agents.<kind>]`
//! overrides them.

use crate::agents::{AgentKind, AgentSpec};
use crate::utils::toml_config::DelveConfig;
use std::collections::HashMap;

/// Registry holding one [`AgentSpec`] per [`AgentKind`]
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, AgentSpec>,
}

impl AgentRegistry {
    /// Create a registry with built-in instructions, all agents on `model`
    pub fn with_defaults(model: &str) -> Self {
        let agents = AgentKind::ALL
            .into_iter()
            .map(|kind| (kind, AgentSpec::new(kind, model, kind.default_instructions())))
            .collect();

        Self { agents }
    }

    /// Create a registry from TOML configuration
    pub fn from_config(config: &DelveConfig) -> Self {
        let mut registry = Self::with_defaults(&config.llm.default_model);

        for kind in AgentKind::ALL {
            let Some(overrides) = config.agent_override(kind) else {
                continue;
            };
            let model = overrides
                .model
                .clone()
                .unwrap_or_else(|| config.llm.default_model.clone());
            let instructions = overrides
                .instructions
                .clone()
                .unwrap_or_else(|| kind.default_instructions().to_string());

            tracing::debug!(agent = %kind, model = %model, "Applying agent override");
            registry.register(AgentSpec::new(kind, model, instructions));
        }

        registry
    }

    /// Register or replace the agent for its kind
    pub fn register(&mut self, spec: AgentSpec) {
        self.agents.insert(spec.kind, spec);
    }

    /// Get the agent for a kind
    pub fn get(&self, kind: AgentKind) -> &AgentSpec {
        // Every kind is inserted by `with_defaults` and never removed.
        &self.agents[&kind]
    }

    /// All agents in pipeline order
    pub fn agents(&self) -> Vec<&AgentSpec> {
        AgentKind::ALL.iter().map(|kind| self.get(*kind)).collect()
    }
}
