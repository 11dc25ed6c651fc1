//! Family integrations of the wallet reconciliation engine.
//!
//! - Bridge contract: account sync and transaction preparation/broadcast
//! - Chain data source boundary, with an in-memory implementation
//! - Static chain table (fees, gas, layer 2 and staking parameters)
//! - Bitcoin, EVM and Cosmos bridges
//! - Static bridge registry

/// Prelude module for convenient imports.
pub mod prelude;

/// Bitcoin-like family.
pub mod bitcoin;
/// Bridge contract.
pub mod bridge;
/// Static chain table.
pub mod config;
/// Cosmos SDK family.
pub mod cosmos;
/// Bridge and registry errors.
pub mod error;
/// EVM family.
pub mod evm;
/// Bridge registry.
pub mod registry;
/// Chain data source boundary.
pub mod source;

mod common;

pub use error::{BridgeError, RegistryError};
