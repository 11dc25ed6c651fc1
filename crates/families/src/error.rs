use crate::bridge::TransactionMode;
use walletsync_cache::CacheError;
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::Amount;

/// Errors raised by family bridges.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The data source failed.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),

    /// A cache key could not be built.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The currency is not in the chain table or belongs to another family.
    #[error("unknown currency for this bridge: {0}")]
    UnknownCurrency(String),

    /// The account holds no sub-account for the token.
    #[error("account {account_id} has no sub-account for token {token_id}")]
    UnknownToken { account_id: String, token_id: String },

    /// The family cannot build this kind of transaction.
    #[error("{family} does not support {mode} transactions")]
    UnsupportedIntent { family: Family, mode: TransactionMode },

    /// The family has no token sub-accounts.
    #[error("{0} does not support token transfers")]
    TokensUnsupported(Family),

    /// Amount plus fees exceed the spendable balance.
    #[error("not enough balance: required {required}, available {available}")]
    NotEnoughBalance { required: Amount, available: Amount },

    /// The amount is below the network's dust limit.
    #[error("amount {amount} is below the dust limit {dust_limit}")]
    AmountBelowDust { amount: Amount, dust_limit: Amount },

    /// The recipient address cannot be encoded.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// No fee information is available for the currency.
    #[error("no fee data available for {0}")]
    MissingFeeData(String),

    /// A fee computation overflowed.
    #[error("fee computation overflowed")]
    FeeOverflow,
}

/// Errors raised by the bridge registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No bridge is registered for the family.
    #[error("unknown family: {0}")]
    UnknownFamily(String),
}
