//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use walletsync_reconcile::prelude::*;
//! ```

pub use crate::error::ReconcileError;
pub use crate::linker::{LinkedOperations, link_operations};
pub use crate::merger::{
    AccountDelta, DuplicatePolicy, MergeOutcome, merge_account, merge_sub_accounts,
};
pub use crate::operations::{merge_operations, merge_pending, prune_confirmed};
pub use crate::sync_hash::{compute_sync_hash, currency_sync_hash};
