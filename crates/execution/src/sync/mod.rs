//! Synchronization passes.
//!
//! A pass resolves the account's bridge, decides between a full and an
//! incremental fetch from the currency's sync hash, links child operations,
//! merges the delta into the previous tree and installs the result.

mod synchronizer;

pub use synchronizer::*;
