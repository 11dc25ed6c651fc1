//! Data model of the wallet reconciliation engine.
//!
//! - Accounts, sub-accounts and operations
//! - Currencies, tokens and the token catalog
//! - Amounts in smallest currency units
//! - Family identifiers

/// Accounts, operations and currencies.
pub mod entities;
/// Family and operation type enums.
pub mod enums;
/// Domain errors.
pub mod error;
/// Amounts and fingerprints.
pub mod value_objects;

pub use error::DomainError;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::entities::{
        Account, BalanceHistory, BalanceHistoryCache, CryptoCurrency, Operation, OperationList,
        SubAccount, SubAccountUpdate, SwapOperation, TokenCatalog, TokenCurrency, operation_list,
    };
    pub use crate::enums::{Family, OperationType};
    pub use crate::error::DomainError;
    pub use crate::value_objects::{Amount, SyncHash};
}
