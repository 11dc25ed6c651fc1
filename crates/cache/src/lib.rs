//! Memoization of expensive backend calls.
//!
//! - Stable cache keys built from family, method and arguments
//! - At most one in-flight computation per key
//! - Per-entry maximum age
//! - Bounded capacity with least-recently-used eviction

mod key;
mod single_flight;

pub use key::*;
pub use single_flight::*;

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Arguments could not be serialized into a key.
    #[error("failed to serialize cache key arguments: {0}")]
    KeySerialization(#[from] serde_json::Error),
}
