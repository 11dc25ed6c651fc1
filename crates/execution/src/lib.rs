//! Synchronization of tracked wallet accounts.
//!
//! This crate drives the reconciliation engine:
//! - Account store with a single writer per account tree
//! - Per-account pass serialization
//! - Full or incremental fetch decided by the currency sync hash
//! - Batch sync with bounded concurrency and isolated failures
//! - Transaction preparation and optimistic operations
//! - Configuration from the environment

/// Prelude module for convenient imports.
pub mod prelude;

/// Configuration.
pub mod config;
/// Synchronization errors.
pub mod error;
/// Account store.
pub mod store;
/// Synchronization passes.
pub mod sync;

pub use error::SyncError;
