//! LRU cache with single-flight computation.

use crate::CacheKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Configuration for a [`Cache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries kept.
    pub capacity: usize,
    /// Maximum age of an entry when the caller gives none.
    ///
    /// `None` means entries are always recomputed; concurrent callers of the
    /// same key still share one computation.
    pub default_max_age: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            default_max_age: None,
        }
    }
}

/// Counters for a [`Cache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from a fresh entry.
    pub hits: u64,
    /// Calls that started a computation.
    pub misses: u64,
    /// Calls that waited on a computation already in flight.
    pub joined: u64,
    /// Computations that returned an error.
    pub failures: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
    /// Store sequence number, used by waiters to recognize a fresh result.
    seq: u64,
    /// Logical access time for LRU eviction.
    last_used: u64,
}

struct State<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    in_flight: HashMap<CacheKey, watch::Receiver<()>>,
    seq: u64,
    clock: u64,
    stats: CacheStats,
}

enum Lease<V> {
    Hit(V),
    Leader(watch::Sender<()>),
    Follower {
        done: watch::Receiver<()>,
        seen: u64,
    },
}

/// Memoizes async computations by [`CacheKey`].
///
/// A caller arriving while the same key is being computed waits for that
/// computation instead of starting another. Failures are never cached: the
/// error goes to the caller that ran the computation, and waiting callers
/// retry.
pub struct Cache<V> {
    state: Mutex<State<V>>,
    config: CacheConfig,
}

impl<V> Cache<V> {
    /// Creates a new cache. A zero capacity is raised to one.
    pub fn new(config: CacheConfig) -> Self {
        let config = CacheConfig {
            capacity: config.capacity.max(1),
            ..config
        };
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                seq: 0,
                clock: 0,
                stats: CacheStats::default(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drops every entry. Computations in flight are unaffected.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    // Critical sections never await, and state stays consistent if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Cache<V> {
    /// Returns the cached value for `key` or computes it with `producer`,
    /// using the configured default maximum age.
    ///
    /// # Errors
    /// Returns the producer's error when this call ran the computation.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &CacheKey, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_compute_with(key, self.config.default_max_age, producer)
            .await
    }

    /// Like [`Cache::get_or_compute`] with an explicit maximum age for this key.
    ///
    /// # Errors
    /// Returns the producer's error when this call ran the computation.
    pub async fn get_or_compute_with<F, Fut, E>(
        &self,
        key: &CacheKey,
        max_age: Option<Duration>,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let done = loop {
            match self.acquire(key, max_age) {
                Lease::Hit(value) => return Ok(value),
                Lease::Leader(done) => break done,
                Lease::Follower { mut done, seen } => {
                    // Resolves when the leader drops its sender, whatever the outcome.
                    let _ = done.changed().await;
                    if let Some(value) = self.produced_since(key, seen) {
                        return Ok(value);
                    }
                    trace!(key = %key, "In-flight computation failed, retrying");
                }
            }
        };

        let _flight = InFlight {
            cache: self,
            key,
            _done: done,
        };

        match producer().await {
            Ok(value) => {
                self.store(key, value.clone());
                Ok(value)
            }
            Err(err) => {
                self.lock().stats.failures += 1;
                debug!(key = %key, "Cache computation failed");
                Err(err)
            }
        }
    }

    fn acquire(&self, key: &CacheKey, max_age: Option<Duration>) -> Lease<V> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clock += 1;

        if let Some(entry) = state.entries.get_mut(key)
            && max_age.is_some_and(|age| entry.stored_at.elapsed() <= age)
        {
            entry.last_used = state.clock;
            state.stats.hits += 1;
            return Lease::Hit(entry.value.clone());
        }

        if let Some(done) = state.in_flight.get(key) {
            state.stats.joined += 1;
            return Lease::Follower {
                done: done.clone(),
                seen: state.seq,
            };
        }

        state.stats.misses += 1;
        let (tx, rx) = watch::channel(());
        state.in_flight.insert(key.clone(), rx);
        Lease::Leader(tx)
    }

    fn produced_since(&self, key: &CacheKey, seen: u64) -> Option<V> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clock += 1;
        let entry = state.entries.get_mut(key).filter(|entry| entry.seq > seen)?;
        entry.last_used = state.clock;
        Some(entry.value.clone())
    }

    fn store(&self, key: &CacheKey, value: V) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.seq += 1;
        state.clock += 1;
        state.entries.insert(
            key.clone(),
            Entry {
                value,
                stored_at: Instant::now(),
                seq: state.seq,
                last_used: state.clock,
            },
        );

        while state.entries.len() > self.config.capacity {
            let Some(oldest) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
            trace!(key = %oldest, "Evicted least recently used entry");
        }
    }
}

/// Marks a key as being computed. Dropping it, including on cancellation,
/// releases the key and wakes waiting callers.
struct InFlight<'a, V> {
    cache: &'a Cache<V>,
    key: &'a CacheKey,
    _done: watch::Sender<()>,
}

impl<V> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        // The sender field is dropped after this, so waiters wake to a released key.
        self.cache.lock().in_flight.remove(self.key);
    }
}
