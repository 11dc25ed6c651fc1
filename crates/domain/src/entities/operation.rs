use crate::enums::OperationType;
use crate::value_objects::Amount;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared, immutable list of operations.
///
/// Lists are swapped wholesale on merge, so an unchanged list keeps its
/// allocation and can be compared with [`Arc::ptr_eq`].
pub type OperationList = Arc<[Arc<Operation>]>;

/// Builds an [`OperationList`] from owned operations.
pub fn operation_list(operations: impl IntoIterator<Item = Operation>) -> OperationList {
    operations.into_iter().map(Arc::new).collect()
}

/// A historical or pending on-chain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Identifier, unique within the owning account.
    pub id: String,
    /// Hash of the transaction that produced this event.
    pub hash: String,
    /// Account (or sub-account) this operation belongs to.
    pub account_id: String,
    pub op_type: OperationType,
    pub value: Amount,
    pub fee: Amount,
    pub senders: Vec<String>,
    pub recipients: Vec<String>,
    /// `None` while the transaction is not yet in a block.
    pub block_height: Option<u64>,
    pub date: DateTime<Utc>,
    /// Token id or NFT contract for token and NFT level events.
    pub contract: Option<String>,
    /// Token-level children sharing this operation's hash.
    pub sub_operations: Vec<Operation>,
    /// NFT-level children sharing this operation's hash.
    pub nft_operations: Vec<Operation>,
}

impl Operation {
    /// Creates an operation with an id derived from account, hash and type.
    pub fn new(
        account_id: impl Into<String>,
        hash: impl Into<String>,
        op_type: OperationType,
        value: Amount,
        date: DateTime<Utc>,
    ) -> Self {
        let account_id = account_id.into();
        let hash = hash.into();
        Self {
            id: Self::encode_id(&account_id, &hash, op_type),
            hash,
            account_id,
            op_type,
            value,
            fee: Amount::zero(),
            senders: Vec::new(),
            recipients: Vec::new(),
            block_height: None,
            date,
            contract: None,
            sub_operations: Vec::new(),
            nft_operations: Vec::new(),
        }
    }

    pub fn encode_id(account_id: &str, hash: &str, op_type: OperationType) -> String {
        format!("{account_id}-{hash}-{op_type}")
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Amount) -> Self {
        self.fee = fee;
        self
    }

    #[must_use]
    pub fn with_block_height(mut self, height: u64) -> Self {
        self.block_height = Some(height);
        self
    }

    #[must_use]
    pub fn with_senders(mut self, senders: Vec<String>) -> Self {
        self.senders = senders;
        self
    }

    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    #[must_use]
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.block_height.is_some()
    }

    pub fn has_children(&self) -> bool {
        !self.sub_operations.is_empty() || !self.nft_operations.is_empty()
    }
}
