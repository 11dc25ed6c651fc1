use crate::entities::operation::{Operation, OperationList, operation_list};
use crate::enums::Family;
use crate::value_objects::{Amount, SyncHash};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Balance samples at one granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceHistory {
    /// Timestamp of the most recent sample.
    pub latest_date: Option<DateTime<Utc>>,
    pub balances: Vec<Amount>,
}

/// Precomputed balance history used by charts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceHistoryCache {
    pub hour: BalanceHistory,
    pub day: BalanceHistory,
    pub week: BalanceHistory,
}

/// A swap the user performed from this account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOperation {
    pub provider: String,
    pub swap_id: String,
    pub status: String,
    pub receiver_account_id: String,
    pub operation_id: String,
    pub from_amount: Amount,
    pub to_amount: Amount,
}

/// A token or auxiliary balance nested under an [`Account`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAccount {
    /// Unique within the parent account and stable across syncs.
    pub id: String,
    pub parent_id: String,
    pub token_id: String,
    pub balance: Amount,
    pub spendable_balance: Amount,
    pub balance_history_cache: Arc<BalanceHistoryCache>,
    pub swap_history: Arc<[SwapOperation]>,
    pub operations: OperationList,
    pub pending_operations: OperationList,
    pub operations_count: usize,
}

impl SubAccount {
    pub fn encode_id(parent_id: &str, token_id: &str) -> String {
        format!("{parent_id}+{token_id}")
    }
}

/// Freshly fetched state for one sub-account.
///
/// Optional fields left at `None` keep whatever value the previously known
/// sub-account holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAccountUpdate {
    pub id: String,
    pub parent_id: String,
    pub token_id: String,
    pub balance: Amount,
    pub spendable_balance: Amount,
    pub balance_history_cache: Option<BalanceHistoryCache>,
    pub swap_history: Option<Vec<SwapOperation>>,
    pub operations: Vec<Operation>,
    pub pending_operations: Vec<Operation>,
}

impl SubAccountUpdate {
    /// Creates an update for the token sub-account of `parent_id`.
    pub fn new(parent_id: impl Into<String>, token_id: impl Into<String>, balance: Amount) -> Self {
        let parent_id = parent_id.into();
        let token_id = token_id.into();
        Self {
            id: SubAccount::encode_id(&parent_id, &token_id),
            parent_id,
            token_id,
            balance,
            spendable_balance: balance,
            balance_history_cache: None,
            swap_history: None,
            operations: Vec::new(),
            pending_operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_operations(mut self, operations: Vec<Operation>) -> Self {
        self.operations = operations;
        self
    }

    #[must_use]
    pub fn with_pending_operations(mut self, pending: Vec<Operation>) -> Self {
        self.pending_operations = pending;
        self
    }

    #[must_use]
    pub fn with_spendable_balance(mut self, spendable: Amount) -> Self {
        self.spendable_balance = spendable;
        self
    }
}

impl From<SubAccountUpdate> for SubAccount {
    fn from(update: SubAccountUpdate) -> Self {
        let operations = operation_list(update.operations);
        Self {
            id: update.id,
            parent_id: update.parent_id,
            token_id: update.token_id,
            balance: update.balance,
            spendable_balance: update.spendable_balance,
            balance_history_cache: Arc::new(update.balance_history_cache.unwrap_or_default()),
            swap_history: update.swap_history.unwrap_or_default().into(),
            operations_count: operations.len(),
            operations,
            pending_operations: operation_list(update.pending_operations),
        }
    }
}

/// Root entity for one address of one currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Globally unique per family, currency and address.
    pub id: String,
    pub family: Family,
    pub currency_id: String,
    pub address: String,
    pub balance: Amount,
    pub spendable_balance: Amount,
    /// Height of the last block seen by a sync.
    pub block_height: u64,
    pub balance_history_cache: Arc<BalanceHistoryCache>,
    pub operations: OperationList,
    pub pending_operations: OperationList,
    /// NFT events not attached to any coin operation.
    pub nft_operations: OperationList,
    pub sub_accounts: Vec<Arc<SubAccount>>,
    pub swap_history: Arc<[SwapOperation]>,
    pub operations_count: usize,
    /// Token-list fingerprint the account was last synced under.
    pub sync_hash: Option<SyncHash>,
}

impl Account {
    pub fn encode_id(family: Family, currency_id: &str, address: &str) -> String {
        format!("{family}:{currency_id}:{address}")
    }

    /// Creates an account with no balance and no history.
    pub fn empty(family: Family, currency_id: impl Into<String>, address: impl Into<String>) -> Self {
        let currency_id = currency_id.into();
        let address = address.into();
        Self {
            id: Self::encode_id(family, &currency_id, &address),
            family,
            currency_id,
            address,
            balance: Amount::zero(),
            spendable_balance: Amount::zero(),
            block_height: 0,
            balance_history_cache: Arc::default(),
            operations: operation_list([]),
            pending_operations: operation_list([]),
            nft_operations: operation_list([]),
            sub_accounts: Vec::new(),
            swap_history: Arc::from([]),
            operations_count: 0,
            sync_hash: None,
        }
    }

    pub fn sub_account(&self, id: &str) -> Option<&Arc<SubAccount>> {
        self.sub_accounts.iter().find(|s| s.id == id)
    }

    pub fn sub_account_for_token(&self, token_id: &str) -> Option<&Arc<SubAccount>> {
        self.sub_accounts.iter().find(|s| s.token_id == token_id)
    }
}
