//! Domain-level errors.

/// Errors raised while building or parsing domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A family identifier that does not name any known family.
    #[error("unknown family id: {0}")]
    UnknownFamilyId(String),

    /// A string that is not an unsigned decimal integer of at most 256 bits.
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
}
