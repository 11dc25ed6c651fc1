use walletsync_families::{BridgeError, RegistryError};
use walletsync_reconcile::ReconcileError;

/// Errors of a synchronization pass or transaction submission.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The account is not tracked.
    #[error("account not tracked: {0}")]
    NotTracked(String),

    /// The account has no tree yet.
    #[error("account {0} has not been synced yet")]
    NotSynced(String),

    /// The currency is not in the chain table.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// No bridge handles the account's family.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The bridge failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Fetched state could not be merged.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A pass task panicked or was cancelled.
    #[error("sync task failed: {0}")]
    Task(String),
}
