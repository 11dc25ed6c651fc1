//! Canonical account trees of tracked addresses.
//!
//! The store is the single writer of account trees: passes read a snapshot,
//! merge into it on their own, and hand the result back through
//! [`AccountStore::install`]. Readers always see a complete tree.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use walletsync_domain::entities::Account;
use walletsync_domain::enums::Family;

/// Identity of a tracked address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub family: Family,
    pub currency_id: String,
    pub address: String,
}

impl AccountKey {
    pub fn new(family: Family, currency_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            family,
            currency_id: currency_id.into(),
            address: address.into(),
        }
    }

    /// Id of the account tree for this address.
    pub fn account_id(&self) -> String {
        Account::encode_id(self.family, &self.currency_id, &self.address)
    }
}

/// Synchronization status of a tracked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Account has not been synced since it was tracked.
    NeedsSync,
    /// A pass is running.
    Syncing,
    /// Last pass succeeded.
    InSync,
    /// Last pass failed.
    Failed,
}

/// State of a tracked account.
#[derive(Debug, Clone)]
pub struct TrackedAccount {
    pub key: AccountKey,
    /// `None` until the first successful sync.
    pub account: Option<Arc<Account>>,
    pub status: SyncStatus,
    /// Changes each time the address is tracked again.
    pub generation: u64,
    /// Consecutive failed passes.
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Result of installing a merged tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The merged tree replaced the previous one.
    Installed,
    /// The merged tree is the previous one.
    Unchanged,
    /// The account was untracked or tracked again during the pass.
    Discarded,
}

struct Entry {
    state: TrackedAccount,
    lane: Arc<Mutex<()>>,
}

/// Store of tracked accounts.
#[derive(Default)]
pub struct AccountStore {
    entries: RwLock<HashMap<String, Entry>>,
    generations: AtomicU64,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an address. Tracking an already tracked address is a no-op.
    ///
    /// Returns the account id.
    pub async fn track(&self, key: AccountKey) -> String {
        let account_id = key.account_id();
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&account_id) {
            let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            entries.insert(
                account_id.clone(),
                Entry {
                    state: TrackedAccount {
                        key,
                        account: None,
                        status: SyncStatus::NeedsSync,
                        generation,
                        failure_count: 0,
                        last_error: None,
                        last_synced_at: None,
                    },
                    lane: Arc::new(Mutex::new(())),
                },
            );
            debug!(account_id = %account_id, generation, "Tracking account");
        }
        account_id
    }

    /// Stops tracking an account and drops its tree. Returns whether it was tracked.
    pub async fn untrack(&self, account_id: &str) -> bool {
        let removed = self.entries.write().await.remove(account_id).is_some();
        if removed {
            debug!(account_id = %account_id, "Stopped tracking account");
        }
        removed
    }

    pub async fn snapshot(&self, account_id: &str) -> Option<TrackedAccount> {
        self.entries
            .read()
            .await
            .get(account_id)
            .map(|entry| entry.state.clone())
    }

    /// Current tree of an account, if it was synced.
    pub async fn account(&self, account_id: &str) -> Option<Arc<Account>> {
        self.entries
            .read()
            .await
            .get(account_id)
            .and_then(|entry| entry.state.account.clone())
    }

    /// Lock serializing passes on one account.
    pub async fn lane(&self, account_id: &str) -> Option<Arc<Mutex<()>>> {
        self.entries
            .read()
            .await
            .get(account_id)
            .map(|entry| Arc::clone(&entry.lane))
    }

    /// Ids of every tracked account, sorted.
    pub async fn account_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn mark_syncing(&self, account_id: &str, generation: u64) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(account_id)
            && entry.state.generation == generation
        {
            entry.state.status = SyncStatus::Syncing;
        }
    }

    /// Installs a merged tree, unless the account stopped being tracked under
    /// `generation` while the pass ran.
    pub async fn install(
        &self,
        account_id: &str,
        generation: u64,
        account: Arc<Account>,
    ) -> InstallOutcome {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries
            .get_mut(account_id)
            .filter(|entry| entry.state.generation == generation)
        else {
            debug!(account_id = %account_id, generation, "Discarding merge of untracked account");
            return InstallOutcome::Discarded;
        };

        let state = &mut entry.state;
        state.status = SyncStatus::InSync;
        state.failure_count = 0;
        state.last_error = None;
        state.last_synced_at = Some(Utc::now());

        if state
            .account
            .as_ref()
            .is_some_and(|previous| Arc::ptr_eq(previous, &account))
        {
            return InstallOutcome::Unchanged;
        }
        state.account = Some(account);
        InstallOutcome::Installed
    }

    /// Records a failed pass. The previous tree stays installed.
    pub async fn record_failure(&self, account_id: &str, generation: u64, error: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(account_id)
            && entry.state.generation == generation
        {
            entry.state.status = SyncStatus::Failed;
            entry.state.failure_count += 1;
            entry.state.last_error = Some(error.to_string());
        }
    }
}
