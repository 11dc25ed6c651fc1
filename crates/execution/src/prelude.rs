//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use walletsync_execution::prelude::*;
//! ```

// Config
pub use crate::config::{ConfigError, SyncConfig};

// Errors
pub use crate::error::SyncError;

// Store
pub use crate::store::{AccountKey, AccountStore, InstallOutcome, SyncStatus, TrackedAccount};

// Sync
pub use crate::sync::{BatchReport, PassReport, Synchronizer};
