//! Boundary to the blockchain backends.
//!
//! A [`ChainDataSource`] performs the actual network I/O (explorers, RPC
//! nodes, indexers) and returns raw, untyped-by-family records. Bridges turn
//! those records into account-shaped deltas.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use walletsync_domain::entities::Operation;
use walletsync_domain::enums::OperationType;
use walletsync_domain::value_objects::Amount;

/// An operation as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperation {
    pub hash: String,
    pub op_type: OperationType,
    pub value: Amount,
    #[serde(default)]
    pub fee: Amount,
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// `None` for transactions still in the mempool.
    #[serde(default)]
    pub block_height: Option<u64>,
    pub date: DateTime<Utc>,
    /// Token id for token transfers, collection contract for NFT moves.
    #[serde(default)]
    pub contract: Option<String>,
}

impl RawOperation {
    /// Converts into a domain operation owned by `account_id`.
    pub fn into_operation(self, account_id: &str) -> Operation {
        let mut op = Operation::new(account_id, self.hash, self.op_type, self.value, self.date)
            .with_fee(self.fee)
            .with_senders(self.senders)
            .with_recipients(self.recipients);
        op.block_height = self.block_height;
        op.contract = self.contract;
        op
    }
}

/// Balance of one token held by an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTokenBalance {
    pub token_id: String,
    pub balance: Amount,
    /// Defaults to `balance` when the backend does not report it.
    #[serde(default)]
    pub spendable_balance: Option<Amount>,
}

/// Backend state of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAccountState {
    pub balance: Amount,
    #[serde(default)]
    pub spendable_balance: Option<Amount>,
    pub block_height: u64,
    #[serde(default)]
    pub coin_operations: Vec<RawOperation>,
    #[serde(default)]
    pub token_operations: Vec<RawOperation>,
    #[serde(default)]
    pub nft_operations: Vec<RawOperation>,
    #[serde(default)]
    pub token_balances: Vec<RawTokenBalance>,
}

/// Network fee conditions reported by a backend.
///
/// Every field is optional; bridges fall back to the chain table defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeeData {
    #[serde(default)]
    pub gas_price: Option<Amount>,
    #[serde(default)]
    pub max_fee_per_gas: Option<Amount>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<Amount>,
    /// Layer 1 gas price, for rollups settling on Ethereum.
    #[serde(default)]
    pub l1_gas_price: Option<Amount>,
    #[serde(default)]
    pub fee_per_vbyte: Option<u64>,
}

/// Arguments of an account fetch. Also serves as cache key arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    pub currency_id: String,
    pub address: String,
    /// Only return history above this height; `None` fetches everything.
    pub since_block: Option<u64>,
}

/// Source of on-chain data for all families.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Fetches the state and history of an address.
    async fn fetch_account(&self, request: &FetchRequest) -> anyhow::Result<RawAccountState>;

    /// Fetches current fee conditions of a currency's network.
    async fn fetch_fee_data(&self, currency_id: &str) -> anyhow::Result<RawFeeData>;

    /// Submits a signed payload and returns the transaction hash.
    async fn broadcast(&self, currency_id: &str, payload: &str) -> anyhow::Result<String>;
}

fn address_key(currency_id: &str, address: &str) -> String {
    format!("{currency_id}:{address}")
}

/// Data source backed by in-memory fixtures.
///
/// Used by tests and by the command line front-end.
#[derive(Default)]
pub struct InMemorySource {
    accounts: RwLock<HashMap<String, RawAccountState>>,
    fee_data: RwLock<HashMap<String, RawFeeData>>,
    failing: RwLock<HashSet<String>>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
    broadcasts: Mutex<Vec<(String, String)>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every fetch by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the state returned for an address.
    pub async fn set_account(&self, currency_id: &str, address: &str, state: RawAccountState) {
        self.accounts
            .write()
            .await
            .insert(address_key(currency_id, address), state);
    }

    pub async fn set_fee_data(&self, currency_id: &str, data: RawFeeData) {
        self.fee_data
            .write()
            .await
            .insert(currency_id.to_string(), data);
    }

    /// Makes fetches of an address fail until [`InMemorySource::recover`] is called.
    pub async fn fail(&self, currency_id: &str, address: &str) {
        self.failing
            .write()
            .await
            .insert(address_key(currency_id, address));
    }

    pub async fn recover(&self, currency_id: &str, address: &str) {
        self.failing
            .write()
            .await
            .remove(&address_key(currency_id, address));
    }

    /// Number of account fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Broadcast payloads received so far, as `(currency_id, payload)`.
    pub fn broadcasts(&self) -> Vec<(String, String)> {
        self.broadcasts
            .lock()
            .map(|broadcasts| broadcasts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChainDataSource for InMemorySource {
    async fn fetch_account(&self, request: &FetchRequest) -> anyhow::Result<RawAccountState> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let key = address_key(&request.currency_id, &request.address);
        if self.failing.read().await.contains(&key) {
            anyhow::bail!("backend unavailable for {key}");
        }

        let mut state = self
            .accounts
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default();

        if let Some(since) = request.since_block {
            let is_new = |op: &RawOperation| op.block_height.is_none_or(|height| height > since);
            state.coin_operations.retain(is_new);
            state.token_operations.retain(is_new);
            state.nft_operations.retain(is_new);
        }

        debug!(
            address = %request.address,
            currency = %request.currency_id,
            since_block = ?request.since_block,
            coin_operations = state.coin_operations.len(),
            "Served account fetch"
        );
        Ok(state)
    }

    async fn fetch_fee_data(&self, currency_id: &str) -> anyhow::Result<RawFeeData> {
        Ok(self
            .fee_data
            .read()
            .await
            .get(currency_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn broadcast(&self, currency_id: &str, payload: &str) -> anyhow::Result<String> {
        let mut broadcasts = self
            .broadcasts
            .lock()
            .map_err(|_| anyhow::anyhow!("broadcast log poisoned"))?;
        broadcasts.push((currency_id.to_string(), payload.to_string()));
        Ok(format!("0x{:064x}", broadcasts.len()))
    }
}
