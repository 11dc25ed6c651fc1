//! Synchronization passes over tracked accounts.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::{AccountKey, AccountStore, InstallOutcome, TrackedAccount};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walletsync_domain::entities::{Account, Operation, TokenCatalog, TokenCurrency};
use walletsync_families::bridge::{
    PreparedTransaction, SignedTransaction, SyncRequest, TransactionIntent,
};
use walletsync_families::config::find_chain;
use walletsync_families::registry::BridgeRegistry;
use walletsync_reconcile::prelude::{
    AccountDelta, currency_sync_hash, link_operations, merge_account, merge_operations,
};

/// Result of one successful pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub account_id: String,
    pub outcome: InstallOutcome,
    /// Whether history was fetched from the start rather than from the last block.
    pub full_sync: bool,
    pub operations_count: usize,
}

/// Result of a batch of passes.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful passes, by account id.
    pub succeeded: Vec<PassReport>,
    /// Failed passes, by account id.
    pub failed: Vec<(String, SyncError)>,
}

/// Runs synchronization passes and installs their results.
///
/// Passes on different accounts run concurrently; passes on the same account
/// are serialized so each merges into the tree installed by the previous one.
#[derive(Clone)]
pub struct Synchronizer {
    registry: Arc<BridgeRegistry>,
    store: Arc<AccountStore>,
    catalog: Arc<RwLock<TokenCatalog>>,
    config: SyncConfig,
    passes: Arc<Semaphore>,
}

impl Synchronizer {
    /// Creates a new synchronizer.
    pub fn new(registry: BridgeRegistry, catalog: TokenCatalog, config: SyncConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(AccountStore::new()),
            catalog: Arc::new(RwLock::new(catalog)),
            passes: Arc::new(Semaphore::new(config.max_concurrent_passes.max(1))),
            config,
        }
    }

    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    pub fn registry(&self) -> &BridgeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Tracks an address and returns its account id.
    pub async fn track(&self, key: AccountKey) -> String {
        self.store.track(key).await
    }

    /// Stops tracking an account. A pass running on it discards its result.
    pub async fn untrack(&self, account_id: &str) -> bool {
        self.store.untrack(account_id).await
    }

    /// Replaces the known token list. Accounts of currencies whose list
    /// changed get a full sync on their next pass.
    pub async fn set_tokens(&self, tokens: Vec<TokenCurrency>) {
        *self.catalog.write().await = TokenCatalog::from_tokens(tokens);
    }

    pub async fn add_token(&self, token: TokenCurrency) {
        self.catalog.write().await.add(token);
    }

    /// Runs one pass on a tracked account.
    ///
    /// # Errors
    /// Returns an error if the account is not tracked, has no bridge, or its
    /// fetch or merge fails. The previous tree stays installed on failure.
    pub async fn sync_account(&self, account_id: &str) -> Result<PassReport, SyncError> {
        let lane = self
            .store
            .lane(account_id)
            .await
            .ok_or_else(|| SyncError::NotTracked(account_id.to_string()))?;
        let _lane = lane.lock().await;

        let tracked = self
            .store
            .snapshot(account_id)
            .await
            .ok_or_else(|| SyncError::NotTracked(account_id.to_string()))?;
        let pass_id = Uuid::new_v4();
        self.store.mark_syncing(account_id, tracked.generation).await;

        info!(
            pass_id = %pass_id,
            account_id = %account_id,
            family = %tracked.key.family,
            "Sync pass started"
        );

        match self.run_pass(pass_id, &tracked).await {
            Ok(report) => {
                info!(
                    pass_id = %pass_id,
                    account_id = %account_id,
                    outcome = ?report.outcome,
                    full_sync = report.full_sync,
                    operations = report.operations_count,
                    "Sync pass finished"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(
                    pass_id = %pass_id,
                    account_id = %account_id,
                    error = %err,
                    "Sync pass failed"
                );
                self.store
                    .record_failure(account_id, tracked.generation, &err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    async fn run_pass(
        &self,
        pass_id: Uuid,
        tracked: &TrackedAccount,
    ) -> Result<PassReport, SyncError> {
        let key = &tracked.key;
        let account_id = key.account_id();
        let bridge = self.registry.resolve(key.family)?;
        let currency = find_chain(&key.currency_id)
            .map(|chain| chain.currency.clone())
            .filter(|currency| currency.family == key.family)
            .ok_or_else(|| SyncError::UnknownCurrency(key.currency_id.clone()))?;

        let sync_hash = currency_sync_hash(&currency, &*self.catalog.read().await);
        let previous = tracked.account.as_ref();
        let since_block = previous
            .filter(|account| !sync_hash.requires_full_sync(account.sync_hash.as_ref()))
            .map(|account| account.block_height);

        debug!(
            pass_id = %pass_id,
            since_block = ?since_block,
            sync_hash = %sync_hash,
            "Fetching account state"
        );

        let shape = bridge
            .sync(&SyncRequest {
                account_id: account_id.clone(),
                currency,
                address: key.address.clone(),
                since_block,
            })
            .await?;

        let linked = link_operations(
            &shape.coin_operations,
            &shape.token_operations,
            &shape.nft_operations,
        );

        let delta = AccountDelta {
            family: key.family,
            currency_id: key.currency_id.clone(),
            address: key.address.clone(),
            balance: shape.balance,
            spendable_balance: shape.spendable_balance,
            block_height: shape.block_height,
            balance_history_cache: None,
            swap_history: None,
            operations: linked.coin_operations,
            pending_operations: shape.pending_operations,
            nft_operations: linked.nft_operations,
            sub_accounts: shape.sub_accounts,
            sync_hash: Some(sync_hash),
            pending_cutoff: self.pending_cutoff(),
        };
        let merged = merge_account(previous, delta, self.config.duplicate_policy)?;
        let operations_count = merged.operations_count;
        let outcome = self
            .store
            .install(&account_id, tracked.generation, merged)
            .await;

        Ok(PassReport {
            pass_id,
            account_id,
            outcome,
            full_sync: since_block.is_none(),
            operations_count,
        })
    }

    /// Runs a pass on every tracked account, at most
    /// [`SyncConfig::max_concurrent_passes`] at a time.
    ///
    /// A failing account never prevents the others from being merged.
    pub async fn sync_all(&self) -> BatchReport {
        let account_ids = self.store.account_ids().await;
        let mut report = BatchReport::default();
        let mut tasks = JoinSet::new();

        for account_id in account_ids {
            let permit = match Arc::clone(&self.passes).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    report
                        .failed
                        .push((account_id, SyncError::Task(err.to_string())));
                    continue;
                }
            };
            let synchronizer = self.clone();
            tasks.spawn(async move {
                let result = synchronizer.sync_account(&account_id).await;
                drop(permit);
                (account_id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(pass))) => report.succeeded.push(pass),
                Ok((account_id, Err(err))) => report.failed.push((account_id, err)),
                Err(err) => error!(error = %err, "Sync task aborted"),
            }
        }

        report
            .succeeded
            .sort_by(|a, b| a.account_id.cmp(&b.account_id));
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch sync complete"
        );
        report
    }

    fn pending_cutoff(&self) -> Option<DateTime<Utc>> {
        let retention = TimeDelta::from_std(self.config.pending_retention?).ok()?;
        Utc::now().checked_sub_signed(retention)
    }

    async fn synced_account(
        &self,
        account_id: &str,
    ) -> Result<(TrackedAccount, Arc<Account>), SyncError> {
        let tracked = self
            .store
            .snapshot(account_id)
            .await
            .ok_or_else(|| SyncError::NotTracked(account_id.to_string()))?;
        let account = tracked
            .account
            .clone()
            .ok_or_else(|| SyncError::NotSynced(account_id.to_string()))?;
        Ok((tracked, account))
    }

    /// Prepares a transaction from a synced account.
    ///
    /// # Errors
    /// Returns an error if the account is unknown or unsynced, or the bridge
    /// rejects the intent.
    pub async fn prepare_transaction(
        &self,
        account_id: &str,
        intent: &TransactionIntent,
    ) -> Result<PreparedTransaction, SyncError> {
        let (tracked, account) = self.synced_account(account_id).await?;
        let bridge = self.registry.resolve(tracked.key.family)?;
        Ok(bridge.prepare_transaction(&account, intent).await?)
    }

    /// Broadcasts a signed transaction and adds the resulting optimistic
    /// operation to the account's pending operations.
    ///
    /// The pending operation is dropped by the first pass that sees its
    /// transaction confirmed.
    ///
    /// # Errors
    /// Returns an error if the account is unknown or unsynced, or the
    /// broadcast fails.
    pub async fn submit_transaction(
        &self,
        account_id: &str,
        signed: &SignedTransaction,
    ) -> Result<Operation, SyncError> {
        let lane = self
            .store
            .lane(account_id)
            .await
            .ok_or_else(|| SyncError::NotTracked(account_id.to_string()))?;
        let _lane = lane.lock().await;

        let (tracked, account) = self.synced_account(account_id).await?;
        let bridge = self.registry.resolve(tracked.key.family)?;
        let op = bridge.broadcast(&account, signed).await?;

        let updated = Arc::new(Account {
            pending_operations: merge_operations(&account.pending_operations, vec![op.clone()]),
            ..Account::clone(&account)
        });
        let outcome = self
            .store
            .install(account_id, tracked.generation, updated)
            .await;

        info!(
            account_id = %account_id,
            hash = %op.hash,
            outcome = ?outcome,
            "Added optimistic operation"
        );
        Ok(op)
    }
}
