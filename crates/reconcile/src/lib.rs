//! Reconciliation of freshly fetched chain state into the account tree.
//!
//! All functions here are pure: they take immutable inputs and return new
//! values, sharing unchanged nodes of the previous tree by reference.
//! - Operation linking by transaction hash
//! - Operation list merge
//! - Account and sub-account merge
//! - Sync hash computation

/// Prelude module for convenient imports.
pub mod prelude;

/// Reconciliation errors.
pub mod error;
/// Coin, token and NFT operation linking.
pub mod linker;
/// Account and sub-account merge.
pub mod merger;
/// Operation list merge.
pub mod operations;
/// Currency token-list fingerprint.
pub mod sync_hash;

pub use error::ReconcileError;
