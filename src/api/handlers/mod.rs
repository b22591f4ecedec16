//! API request handlers.

/// Research run handlers.
pub mod runs;
