//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use walletsync_families::prelude::*;
//! ```

pub use crate::bitcoin::BitcoinBridge;
pub use crate::bridge::{
    AccountBridge, AccountShape, FeeParams, PreparedTransaction, SignedTransaction, SyncRequest,
    TransactionIntent, TransactionMode,
};
pub use crate::config::{
    CHAINS, ChainConfig, ChainParams, CosmosGas, CosmosParams, EvmParams, Layer2, UtxoParams,
    find_chain, supported_currencies,
};
pub use crate::cosmos::CosmosBridge;
pub use crate::error::{BridgeError, RegistryError};
pub use crate::evm::{EvmBridge, EvmTransaction};
pub use crate::registry::BridgeRegistry;
pub use crate::source::{
    ChainDataSource, FetchRequest, InMemorySource, RawAccountState, RawFeeData, RawOperation,
    RawTokenBalance,
};
