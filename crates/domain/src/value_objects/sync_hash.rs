use serde::{Deserialize, Serialize};
use std::fmt;

/// Fingerprint of a currency's token metadata.
///
/// Only ever compared for equality across sync passes: a mismatch with the
/// hash stored on an account means the account must be fully resynchronized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncHash(String);

impl SyncHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an account last synced under `previous` needs a full resync.
    ///
    /// An account that never recorded a hash always does.
    pub fn requires_full_sync(&self, previous: Option<&SyncHash>) -> bool {
        previous != Some(self)
    }
}

impl fmt::Display for SyncHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
