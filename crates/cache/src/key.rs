//! Cache keys.

use crate::CacheError;
use serde::Serialize;
use std::fmt;

/// Key of a memoized call: `family:method:arguments`.
///
/// Arguments are serialized through `serde_json::Value`, whose object keys are
/// sorted, so semantically identical calls produce identical keys whatever the
/// field or insertion order of the argument values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a key for `method` of `family` called with `args`.
    ///
    /// # Errors
    /// Returns an error if `args` cannot be represented as JSON.
    pub fn new(
        family: impl fmt::Display,
        method: &str,
        args: &impl Serialize,
    ) -> Result<Self, CacheError> {
        let args = serde_json::to_value(args)?;
        Ok(Self(format!("{family}:{method}:{args}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Args<'a> {
        address: &'a str,
        since_block: Option<u64>,
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::new(
            "evm",
            "fetch_account",
            &Args {
                address: "0xabc",
                since_block: Some(7),
            },
        )
        .unwrap();
        assert_eq!(
            key.as_str(),
            r#"evm:fetch_account:{"address":"0xabc","since_block":7}"#
        );
    }

    #[test]
    fn test_key_ignores_map_insertion_order() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = HashMap::new();
        second.insert("a", 1);
        second.insert("b", 2);

        assert_eq!(
            CacheKey::new("bitcoin", "utxos", &first).unwrap(),
            CacheKey::new("bitcoin", "utxos", &second).unwrap()
        );
    }

    #[test]
    fn test_key_differs_per_method() {
        let a = CacheKey::new("cosmos", "balance", &"addr").unwrap();
        let b = CacheKey::new("cosmos", "delegations", &"addr").unwrap();
        assert_ne!(a, b);
    }
}
