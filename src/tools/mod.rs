//! Capabilities used by the research pipeline besides agent calls.
//!
//! - [`registry`] - Tools the model may call during an agent run
//! - [`search`] - The `web_search` tool used by the search agent
//! - [`artifact`] - Rendering finished reports to files

/// Artifact generation from finished reports.
pub mod artifact;
/// Tool trait and registry.
pub mod registry;
/// Web search tool using daedra.
pub mod search;

pub use artifact::{ArtifactGenerator, FileArtifactGenerator};
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use search::WebSearchTool;
