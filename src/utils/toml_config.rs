//! TOML-based configuration for delve
//!
//! This module provides declarative configuration for the server, the
//! agent-invocation endpoint, per-agent overrides, the research pipeline and
//! run persistence via a TOML file (`delve.toml`).

use crate::agents::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Root configuration structure loaded from delve.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelveConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-agent overrides keyed by agent kind (triage, clarifying, planner, ...)
    #[serde(default)]
    pub agents: HashMap<String, AgentOverride>,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable containing the API key (optional for local servers)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model used by every agent without an explicit override
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: None,
            default_model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverride {
    /// Model for this agent, defaults to `llm.default_model`
    #[serde(default)]
    pub model: Option<String>,

    /// Replacement instructions for this agent
    #[serde(default)]
    pub instructions: Option<String>,
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Generate an artifact after the report when the caller does not say otherwise
    #[serde(default)]
    pub generate_artifact: bool,

    /// Fixed artifact title; when unset the artifact agent picks one
    #[serde(default)]
    pub artifact_title: Option<String>,

    /// Directory artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub font_size: Option<u32>,

    #[serde(default)]
    pub primary_color: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            generate_artifact: false,
            artifact_title: None,
            output_dir: default_output_dir(),
            font_size: None,
            primary_color: None,
        }
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for persisted run state. Runs are kept in memory only when unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Unknown agent '{0}' in [agents] section")]
    UnknownAgent(String),
}

impl DelveConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {:?}", path);

        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DelveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.llm.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.default_model must not be empty".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (name, agent) in &self.agents {
            if AgentKind::from_str(name).is_err() {
                return Err(ConfigError::UnknownAgent(name.clone()));
            }
            if let Some(model) = &agent.model {
                if model.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "agents.{}.model must not be empty",
                        name
                    )));
                }
            }
        }

        if matches!(&self.research.artifact_title, Some(title) if title.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "research.artifact_title must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the API key from the environment, if one is configured
    pub fn api_key(&self) -> Result<Option<String>, ConfigError> {
        match &self.llm.api_key_env {
            None => Ok(None),
            Some(env) => std::env::var(env)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnvVar(env.clone())),
        }
    }

    /// Get the override for an agent kind
    pub fn agent_override(&self, kind: AgentKind) -> Option<&AgentOverride> {
        self.agents.get(kind.as_str())
    }
}
