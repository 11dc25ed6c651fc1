pub mod account;
pub mod currency;
pub mod operation;

// Re-export for easier access
pub use account::{
    Account, BalanceHistory, BalanceHistoryCache, SubAccount, SubAccountUpdate, SwapOperation,
};
pub use currency::{CryptoCurrency, TokenCatalog, TokenCurrency};
pub use operation::{Operation, OperationList, operation_list};
