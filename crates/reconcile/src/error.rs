//! Errors raised while merging fetched state.

/// Reconciliation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The same identifier appeared more than once in one incoming batch.
    #[error("duplicate sub-account ids in incoming batch: {}", ids.join(", "))]
    MergeInvariantViolation {
        /// Identifiers seen more than once, in first-seen order.
        ids: Vec<String>,
    },
    /// A delta was applied to an account other than the one it was fetched for.
    #[error("delta for account {found} cannot be merged into account {expected}")]
    AccountMismatch {
        /// Id of the account being merged into.
        expected: String,
        /// Id carried by the delta.
        found: String,
    },
}
