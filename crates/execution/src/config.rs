//! Synchronization configuration.

use std::time::Duration;
use walletsync_cache::CacheConfig;
use walletsync_reconcile::prelude::DuplicatePolicy;

/// Environment variable overriding [`CacheConfig::capacity`].
pub const ENV_CACHE_CAPACITY: &str = "WALLETSYNC_CACHE_CAPACITY";
/// Environment variable overriding [`CacheConfig::default_max_age`], in seconds.
pub const ENV_CACHE_MAX_AGE_SECS: &str = "WALLETSYNC_CACHE_MAX_AGE_SECS";
/// Environment variable overriding [`SyncConfig::max_concurrent_passes`].
pub const ENV_MAX_CONCURRENT_PASSES: &str = "WALLETSYNC_MAX_CONCURRENT_PASSES";
/// Environment variable overriding [`SyncConfig::duplicate_policy`].
pub const ENV_DUPLICATE_POLICY: &str = "WALLETSYNC_DUPLICATE_POLICY";
/// Environment variable overriding [`SyncConfig::pending_retention`], in seconds.
/// `0` expires unreported pending operations on the next pass; `off` keeps them.
pub const ENV_PENDING_RETENTION_SECS: &str = "WALLETSYNC_PENDING_RETENTION_SECS";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration of the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cache settings of every bridge.
    pub cache: CacheConfig,
    /// Maximum number of passes running at once in a batch.
    pub max_concurrent_passes: usize,
    /// Handling of duplicate sub-account ids reported by a bridge.
    pub duplicate_policy: DuplicatePolicy,
    /// How long a pending operation the backend no longer reports is kept
    /// before it is dropped. `None` keeps it until it confirms.
    pub pending_retention: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_concurrent_passes: 4,
            duplicate_policy: DuplicatePolicy::Reject,
            pending_retention: Some(Duration::from_secs(30 * 60)),
        }
    }
}

impl SyncConfig {
    /// Builds a configuration from the defaults and the process environment.
    ///
    /// # Errors
    /// Returns an error if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from the defaults and `lookup`.
    ///
    /// # Errors
    /// Returns an error if a present value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_CACHE_CAPACITY) {
            config.cache.capacity = parse(ENV_CACHE_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_MAX_AGE_SECS) {
            let secs: u64 = parse(ENV_CACHE_MAX_AGE_SECS, &value)?;
            config.cache.default_max_age = Some(Duration::from_secs(secs));
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT_PASSES) {
            config.max_concurrent_passes = parse(ENV_MAX_CONCURRENT_PASSES, &value)?;
        }
        if let Some(value) = lookup(ENV_DUPLICATE_POLICY) {
            let policy = value.trim().to_ascii_lowercase();
            config.duplicate_policy = match policy.as_str() {
                "reject" => DuplicatePolicy::Reject,
                "last_write_wins" => DuplicatePolicy::LastWriteWins,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_DUPLICATE_POLICY,
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup(ENV_PENDING_RETENTION_SECS) {
            config.pending_retention = if value.trim().eq_ignore_ascii_case("off") {
                None
            } else {
                let secs: u64 = parse(ENV_PENDING_RETENTION_SECS, &value)?;
                Some(Duration::from_secs(secs))
            };
        }

        config.max_concurrent_passes = config.max_concurrent_passes.max(1);
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_concurrent_passes, 4);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(config.cache.default_max_age.is_none());
        assert_eq!(config.pending_retention, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_CACHE_CAPACITY, "16"),
            (ENV_CACHE_MAX_AGE_SECS, "30"),
            (ENV_MAX_CONCURRENT_PASSES, "0"),
            (ENV_DUPLICATE_POLICY, "LAST_WRITE_WINS"),
        ]))
        .unwrap();

        assert_eq!(config.cache.capacity, 16);
        assert_eq!(config.cache.default_max_age, Some(Duration::from_secs(30)));
        assert_eq!(config.max_concurrent_passes, 1);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::LastWriteWins);
    }

    #[test]
    fn test_pending_retention_variable() {
        let config =
            SyncConfig::from_lookup(lookup(&[(ENV_PENDING_RETENTION_SECS, "120")])).unwrap();
        assert_eq!(config.pending_retention, Some(Duration::from_secs(120)));

        let config =
            SyncConfig::from_lookup(lookup(&[(ENV_PENDING_RETENTION_SECS, "OFF")])).unwrap();
        assert_eq!(config.pending_retention, None);

        let err =
            SyncConfig::from_lookup(lookup(&[(ENV_PENDING_RETENTION_SECS, "-5")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_PENDING_RETENTION_SECS, .. }));
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = SyncConfig::from_lookup(lookup(&[(ENV_CACHE_CAPACITY, "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_CACHE_CAPACITY,
                value: "lots".to_string()
            }
        );
    }
}
