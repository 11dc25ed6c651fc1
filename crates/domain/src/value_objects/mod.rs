pub mod amount;
pub mod sync_hash;

pub use amount::Amount;
pub use sync_hash::SyncHash;
