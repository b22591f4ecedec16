//! Run persistence traits
//!
//! The run host writes every state transition through a [`RunStore`] so a run
//! suspended in `AwaitingClarifications` outlives the process that started it.
//!
//! # Example
//!
//! ```rust,ignore
//! use delve::db::{FileRunStore, RunStore};
//!
//! let store = FileRunStore::new("./state").await?;
//! let host = ResearchHost::new(pipeline).with_store(Arc::new(store));
//! host.restore().await?;
//! ```

use crate::research::RunState;
use crate::types::Result;
use async_trait::async_trait;

/// Durable storage for run state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save the latest state of a run, replacing any earlier one
    async fn save(&self, state: &RunState) -> Result<()>;

    /// Load every stored run
    async fn load_all(&self) -> Result<Vec<RunState>>;
}
