//! Research orchestration
//!
//! A research run turns one natural-language query into a structured report:
//!
//! 1. **Triage** - decide whether the query needs clarifying questions
//! 2. **Clarification** - optionally suspend until an external party answers
//! 3. **Planning** - produce a list of web searches
//! 4. **Searching** - run every planned search concurrently, tolerating failures
//! 5. **Writing** - synthesize the successful summaries into a report
//! 6. **Artifact** - optionally render the report to a file
//!
//! # Usage
//!
//! ```ignore
//! use delve::research::{ResearchHost, ResearchPipeline};
//! use delve::types::StartOptions;
//!
//! let host = ResearchHost::new(Arc::new(ResearchPipeline::new(agents, invoker)));
//!
//! let status = host
//!     .start_research("run-1", "best restaurants in Melbourne", StartOptions {
//!         use_clarifications: true,
//!         generate_artifact: false,
//!     })
//!     .await?;
//!
//! for (index, question) in status.clarification_questions.iter().enumerate() {
//!     host.provide_single_clarification("run-1", index, &ask(question)).await?;
//! }
//! let result = host.complete_clarifications("run-1").await?;
//! println!("{}", result.report.markdown_report);
//! ```

/// Clarification questions, answers and query enrichment.
pub mod clarification;
/// Concurrent search batches.
pub mod fanout;
/// Run ownership, routing and persistence.
pub mod host;
/// The per-run state machine.
pub mod pipeline;
/// Single search execution.
pub mod search;

pub use clarification::{ClarificationState, NO_PREFERENCE};
pub use fanout::SearchCoordinator;
pub use host::ResearchHost;
pub use pipeline::{ArtifactSettings, ResearchPipeline, RunState};
pub use search::SearchRunner;
