//! The per-family bridge contract.

use crate::error::BridgeError;
use crate::evm::EvmTransaction;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use walletsync_domain::entities::{Account, CryptoCurrency, Operation, SubAccountUpdate};
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::Amount;

/// What a synchronization pass asks a bridge for.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub account_id: String,
    pub currency: CryptoCurrency,
    pub address: String,
    /// Last known block height for an incremental sync, `None` for a full one.
    pub since_block: Option<u64>,
}

/// Account-shaped delta produced by a bridge.
///
/// Operations are tagged with their transaction hash and owning account, but
/// not yet linked: token and NFT operations are listed on their own.
#[derive(Debug, Clone, Default)]
pub struct AccountShape {
    pub balance: Amount,
    pub spendable_balance: Amount,
    pub block_height: u64,
    pub coin_operations: Vec<Operation>,
    pub token_operations: Vec<Operation>,
    pub nft_operations: Vec<Operation>,
    /// Mempool operations reported by the backend.
    pub pending_operations: Vec<Operation>,
    pub sub_accounts: Vec<SubAccountUpdate>,
}

/// Kind of transaction to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    #[default]
    Send,
    Delegate,
    Undelegate,
    Redelegate,
    ClaimReward,
    ClaimRewardCompound,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::Send => "send",
            TransactionMode::Delegate => "delegate",
            TransactionMode::Undelegate => "undelegate",
            TransactionMode::Redelegate => "redelegate",
            TransactionMode::ClaimReward => "claimReward",
            TransactionMode::ClaimRewardCompound => "claimRewardCompound",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction the user wants to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub mode: TransactionMode,
    /// Recipient address, or validator address for staking modes.
    pub recipient: String,
    pub amount: Amount,
    /// Set to transfer a token held in a sub-account instead of the coin.
    pub token_id: Option<String>,
}

impl TransactionIntent {
    pub fn send(recipient: impl Into<String>, amount: Amount) -> Self {
        Self {
            mode: TransactionMode::Send,
            recipient: recipient.into(),
            amount,
            token_id: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TransactionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_token(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }
}

/// Family-specific fee parameters of a prepared transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeParams {
    Utxo { fee_per_vbyte: u64, vbytes: u64 },
    Evm(EvmTransaction),
    Cosmos { gas: u64, gas_price: Decimal },
}

/// A transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub account_id: String,
    pub currency_id: String,
    pub intent: TransactionIntent,
    pub fee_params: FeeParams,
    /// Total network fees paid in the native coin.
    pub estimated_fees: Amount,
}

/// A prepared transaction with its signed payload.
///
/// Signing happens on the device, outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: PreparedTransaction,
    pub payload: String,
}

/// Synchronization and transaction interface of one family.
#[async_trait]
pub trait AccountBridge: Send + Sync {
    fn family(&self) -> Family;

    /// Fetches backend state of an address as an account-shaped delta.
    async fn sync(&self, request: &SyncRequest) -> Result<AccountShape, BridgeError>;

    /// Validates an intent against the account and computes its fees.
    async fn prepare_transaction(
        &self,
        account: &Account,
        intent: &TransactionIntent,
    ) -> Result<PreparedTransaction, BridgeError>;

    /// Broadcasts a signed transaction and returns the optimistic operation
    /// to add to the account's pending operations.
    async fn broadcast(
        &self,
        account: &Account,
        signed: &SignedTransaction,
    ) -> Result<Operation, BridgeError>;
}
