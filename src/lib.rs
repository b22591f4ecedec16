//! # delve - durable multi-agent research
//!
//! delve turns one natural-language query into a structured research report
//! by coordinating several narrowly scoped agents: a triage agent decides
//! whether clarifying questions are needed, a planner proposes web searches,
//! a search agent summarizes each search, and a writer synthesizes the report.
//!
//! ## Overview
//!
//! delve can be used in two ways:
//!
//! 1. **As a standalone server or CLI** - Run the `delve` binary
//! 2. **As a library** - Embed [`research::ResearchHost`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use delve::{AgentRegistry, DelveConfig, ResearchHost, ResearchPipeline};
//! use delve::llm::OpenAiCompatibleInvoker;
//! use delve::types::StartOptions;
//! use std::sync::Arc;
//!
//! let config = DelveConfig::load("delve.toml")?;
//! let invoker = OpenAiCompatibleInvoker::new(&config.llm.base_url, None, timeout)?;
//! let pipeline = ResearchPipeline::new(
//!     Arc::new(AgentRegistry::from_config(&config)),
//!     Arc::new(invoker),
//! );
//! let host = ResearchHost::new(Arc::new(pipeline));
//!
//! let result = host.run_direct("run-1", "current population of Tokyo", false).await?;
//! println!("{}", result.report.markdown_report);
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Agent kinds, specs and the registry
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`db`] - Run state persistence
//! - [`llm`] - Agent invocation
//! - [`research`] - Pipeline, search fan-out and run host
//! - [`tools`] - Artifact generation
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration

/// Agent kinds, specs and registry.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Run state persistence.
pub mod db;
/// Agent invocation capability.
pub mod llm;
/// Research pipeline and run host.
pub mod research;
/// Artifact generation.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::AgentRegistry;
pub use research::{ResearchHost, ResearchPipeline};
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigError, DelveConfig};

use axum::{routing::get, Router};
use db::FileRunStore;
use llm::{AgentInvoker, OpenAiCompatibleInvoker};
use research::ArtifactSettings;
use std::sync::Arc;
use std::time::Duration;
use tools::{FileArtifactGenerator, ToolRegistry};
use tower_http::trace::TraceLayer;
use types::StylingOptions;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<DelveConfig>,
    /// Agent configuration set
    pub agents: Arc<AgentRegistry>,
    /// Run host owning every research run
    pub host: Arc<ResearchHost>,
}

impl AppState {
    /// Build the full stack from configuration, restoring persisted runs
    pub async fn from_config(config: DelveConfig) -> Result<Self> {
        let invoker = Self::invoker(&config)?;
        Self::with_invoker(config, invoker).await
    }

    /// Build the stack for a single CLI run; persisted runs are left for the server
    pub async fn from_config_one_shot(config: DelveConfig) -> Result<Self> {
        let invoker = Self::invoker(&config)?;
        Self::one_shot(config, invoker).await
    }

    fn invoker(config: &DelveConfig) -> Result<Arc<dyn AgentInvoker>> {
        let api_key = config
            .api_key()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let invoker = OpenAiCompatibleInvoker::new(
            config.llm.base_url.clone(),
            api_key,
            Duration::from_secs(config.llm.timeout_secs),
        )?
        .with_tools(Arc::new(ToolRegistry::with_default_tools()));
        Ok(Arc::new(invoker))
    }

    /// Build the stack around a given agent invoker, restoring persisted runs
    pub async fn with_invoker(config: DelveConfig, invoker: Arc<dyn AgentInvoker>) -> Result<Self> {
        let state = Self::build(config, invoker).await?;
        let restored = state.host.restore().await?;
        if restored > 0 {
            tracing::info!(restored, "Restored persisted runs");
        }
        Ok(state)
    }

    /// Build the stack around a given agent invoker without touching persisted runs
    pub async fn one_shot(config: DelveConfig, invoker: Arc<dyn AgentInvoker>) -> Result<Self> {
        Self::build(config, invoker).await
    }

    async fn build(config: DelveConfig, invoker: Arc<dyn AgentInvoker>) -> Result<Self> {
        let agents = Arc::new(AgentRegistry::from_config(&config));

        let research = &config.research;
        let styling = if research.font_size.is_some() || research.primary_color.is_some() {
            Some(StylingOptions {
                font_size: research.font_size,
                primary_color: research.primary_color.clone(),
            })
        } else {
            None
        };
        let pipeline = ResearchPipeline::new(agents.clone(), invoker).with_artifacts(
            Arc::new(FileArtifactGenerator::new(research.output_dir.clone())),
            ArtifactSettings {
                title: research.artifact_title.clone(),
                styling,
            },
        );

        let mut host = ResearchHost::new(Arc::new(pipeline));
        if let Some(dir) = &config.storage.state_dir {
            let store = FileRunStore::new(dir.clone()).await?;
            host = host.with_store(Arc::new(store));
        }
        let host = Arc::new(host);

        Ok(Self {
            config: Arc::new(config),
            agents,
            host,
        })
    }
}

/// The complete HTTP application
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api::routes::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
