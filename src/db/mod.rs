//! Run state persistence.
//!
//! - [`RunStore`]: storage abstraction used by the run host
//! - [`FileRunStore`]: one JSON document per run in a state directory
//!
//! Without a configured `[storage] state_dir` runs live in memory only.

pub mod file_store;
pub mod traits;

pub use file_store::FileRunStore;
pub use traits::RunStore;

#[cfg(test)]
pub use traits::MockRunStore;
