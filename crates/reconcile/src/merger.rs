//! Folds freshly fetched state into the previously known account tree.
//!
//! Only the fields that actually changed produce a new node. Everything else,
//! including whole sub-accounts, keeps the previous `Arc` so readers holding
//! the old tree can detect "nothing changed" with a pointer comparison.

use crate::error::ReconcileError;
use crate::operations::{merge_operations, merge_pending, prune_confirmed};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use walletsync_domain::entities::{
    Account, BalanceHistoryCache, Operation, SubAccount, SubAccountUpdate, SwapOperation,
};
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::{Amount, SyncHash};

/// What to do when an incoming batch repeats a sub-account id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the merge with [`ReconcileError::MergeInvariantViolation`].
    #[default]
    Reject,
    /// Keep the last record for each id and report the duplicates.
    LastWriteWins,
}

/// Result of [`merge_sub_accounts`].
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Previously known sub-accounts in their prior order, then new ones.
    pub sub_accounts: Vec<Arc<SubAccount>>,
    /// Ids that appeared more than once in the incoming batch.
    pub duplicate_ids: Vec<String>,
}

/// Merges incoming sub-account records into the previously known ones.
///
/// Without previous sub-accounts the incoming records are taken as they are.
/// Otherwise known ids are updated in place (keeping their `Arc` when nothing
/// changed) and unknown ids are appended in arrival order.
pub fn merge_sub_accounts(
    previous: Option<&[Arc<SubAccount>]>,
    incoming: Vec<SubAccountUpdate>,
    policy: DuplicatePolicy,
) -> Result<MergeOutcome, ReconcileError> {
    merge_sub_accounts_until(previous, incoming, policy, None)
}

// Pending operations older than `pending_cutoff` and absent from their update expire.
fn merge_sub_accounts_until(
    previous: Option<&[Arc<SubAccount>]>,
    incoming: Vec<SubAccountUpdate>,
    policy: DuplicatePolicy,
    pending_cutoff: Option<DateTime<Utc>>,
) -> Result<MergeOutcome, ReconcileError> {
    let (incoming, duplicate_ids) = dedup_incoming(incoming);
    if !duplicate_ids.is_empty() {
        match policy {
            DuplicatePolicy::Reject => {
                return Err(ReconcileError::MergeInvariantViolation { ids: duplicate_ids });
            }
            DuplicatePolicy::LastWriteWins => {
                warn!(ids = ?duplicate_ids, "Duplicate sub-account ids in incoming batch");
            }
        }
    }

    let Some(previous) = previous else {
        return Ok(MergeOutcome {
            sub_accounts: incoming.into_iter().map(new_sub_account).collect(),
            duplicate_ids,
        });
    };

    let index_by_id: HashMap<&str, usize> = previous
        .iter()
        .enumerate()
        .map(|(index, sub)| (sub.id.as_str(), index))
        .collect();

    let mut merged: Vec<Arc<SubAccount>> = previous.to_vec();
    let mut added: Vec<Arc<SubAccount>> = Vec::new();

    for update in incoming {
        match index_by_id.get(update.id.as_str()) {
            Some(&index) => {
                merged[index] = merge_sub_account(&previous[index], update, pending_cutoff);
            }
            None => added.push(new_sub_account(update)),
        }
    }

    if !added.is_empty() {
        debug!(added = added.len(), "Discovered new sub-accounts");
    }
    merged.extend(added);

    Ok(MergeOutcome {
        sub_accounts: merged,
        duplicate_ids,
    })
}

// Keeps the last record per id at the position of its first occurrence.
fn dedup_incoming(incoming: Vec<SubAccountUpdate>) -> (Vec<SubAccountUpdate>, Vec<String>) {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SubAccountUpdate> = Vec::with_capacity(incoming.len());
    let mut duplicates: Vec<String> = Vec::new();

    for update in incoming {
        match position.get(&update.id) {
            Some(&slot) => {
                if !duplicates.contains(&update.id) {
                    duplicates.push(update.id.clone());
                }
                unique[slot] = update;
            }
            None => {
                position.insert(update.id.clone(), unique.len());
                unique.push(update);
            }
        }
    }

    (unique, duplicates)
}

fn new_sub_account(update: SubAccountUpdate) -> Arc<SubAccount> {
    let mut sub = SubAccount::from(update);
    sub.pending_operations = prune_confirmed(&sub.pending_operations, &sub.operations);
    Arc::new(sub)
}

fn merge_sub_account(
    previous: &Arc<SubAccount>,
    update: SubAccountUpdate,
    pending_cutoff: Option<DateTime<Utc>>,
) -> Arc<SubAccount> {
    let mut changed = false;

    let balance = diff_value(previous.balance, update.balance, &mut changed);
    let spendable_balance =
        diff_value(previous.spendable_balance, update.spendable_balance, &mut changed);
    let balance_history_cache = diff_arc(
        &previous.balance_history_cache,
        update.balance_history_cache,
        &mut changed,
    );
    let swap_history = diff_slice(&previous.swap_history, update.swap_history, &mut changed);

    let operations = merge_operations(&previous.operations, update.operations);
    let pending_operations = merge_pending(
        &previous.pending_operations,
        update.pending_operations,
        &operations,
        pending_cutoff,
    );
    changed |= !Arc::ptr_eq(&operations, &previous.operations);
    changed |= !Arc::ptr_eq(&pending_operations, &previous.pending_operations);
    changed |= previous.operations_count != operations.len();

    if !changed {
        return Arc::clone(previous);
    }

    Arc::new(SubAccount {
        balance,
        spendable_balance,
        balance_history_cache,
        swap_history,
        operations_count: operations.len(),
        operations,
        pending_operations,
        ..SubAccount::clone(previous)
    })
}

/// Freshly fetched state for one account.
#[derive(Debug, Clone)]
pub struct AccountDelta {
    pub family: Family,
    pub currency_id: String,
    pub address: String,
    pub balance: Amount,
    pub spendable_balance: Amount,
    pub block_height: u64,
    /// `None` keeps the previously known history.
    pub balance_history_cache: Option<BalanceHistoryCache>,
    /// `None` keeps the previously known swaps.
    pub swap_history: Option<Vec<SwapOperation>>,
    /// Coin operations, with token and NFT children already linked.
    pub operations: Vec<Operation>,
    pub pending_operations: Vec<Operation>,
    /// NFT operations left standalone after linking.
    pub nft_operations: Vec<Operation>,
    pub sub_accounts: Vec<SubAccountUpdate>,
    /// Fingerprint the delta was fetched under.
    pub sync_hash: Option<SyncHash>,
    /// Previously pending operations dated before this instant expire unless
    /// the delta still reports them. `None` keeps them until confirmed.
    pub pending_cutoff: Option<DateTime<Utc>>,
}

impl AccountDelta {
    pub fn account_id(&self) -> String {
        Account::encode_id(self.family, &self.currency_id, &self.address)
    }
}

/// Merges a fetched delta into the previous account, or creates the account
/// on its first successful sync.
///
/// Returns the previous `Arc` untouched when the delta changes nothing.
pub fn merge_account(
    previous: Option<&Arc<Account>>,
    delta: AccountDelta,
    policy: DuplicatePolicy,
) -> Result<Arc<Account>, ReconcileError> {
    let account_id = delta.account_id();
    let fresh;
    let previous = match previous {
        Some(account) if account.id != account_id => {
            return Err(ReconcileError::AccountMismatch {
                expected: account.id.clone(),
                found: account_id,
            });
        }
        Some(account) => account,
        None => {
            fresh = Arc::new(Account::empty(
                delta.family,
                delta.currency_id.clone(),
                delta.address.clone(),
            ));
            &fresh
        }
    };

    let outcome = merge_sub_accounts_until(
        Some(previous.sub_accounts.as_slice()),
        delta.sub_accounts,
        policy,
        delta.pending_cutoff,
    )?;

    let mut changed = false;

    let balance = diff_value(previous.balance, delta.balance, &mut changed);
    let spendable_balance =
        diff_value(previous.spendable_balance, delta.spendable_balance, &mut changed);
    let block_height = diff_value(previous.block_height, delta.block_height, &mut changed);
    let balance_history_cache = diff_arc(
        &previous.balance_history_cache,
        delta.balance_history_cache,
        &mut changed,
    );
    let swap_history = diff_slice(&previous.swap_history, delta.swap_history, &mut changed);

    let operations = merge_operations(&previous.operations, delta.operations);
    let pending_operations = merge_pending(
        &previous.pending_operations,
        delta.pending_operations,
        &operations,
        delta.pending_cutoff,
    );
    let nft_operations = merge_operations(&previous.nft_operations, delta.nft_operations);
    changed |= !Arc::ptr_eq(&operations, &previous.operations);
    changed |= !Arc::ptr_eq(&pending_operations, &previous.pending_operations);
    changed |= !Arc::ptr_eq(&nft_operations, &previous.nft_operations);

    changed |= outcome.sub_accounts.len() != previous.sub_accounts.len()
        || outcome
            .sub_accounts
            .iter()
            .zip(&previous.sub_accounts)
            .any(|(next, prev)| !Arc::ptr_eq(next, prev));

    let sync_hash = match delta.sync_hash {
        Some(hash) if previous.sync_hash.as_ref() != Some(&hash) => {
            changed = true;
            Some(hash)
        }
        _ => previous.sync_hash.clone(),
    };

    if !changed {
        debug!(account_id = %previous.id, "Account unchanged after merge");
        return Ok(Arc::clone(previous));
    }

    Ok(Arc::new(Account {
        balance,
        spendable_balance,
        block_height,
        balance_history_cache,
        swap_history,
        operations_count: operations.len(),
        operations,
        pending_operations,
        nft_operations,
        sub_accounts: outcome.sub_accounts,
        sync_hash,
        ..Account::clone(previous)
    }))
}

fn diff_value<T: PartialEq + Copy>(previous: T, next: T, changed: &mut bool) -> T {
    if previous == next {
        previous
    } else {
        *changed = true;
        next
    }
}

fn diff_arc<T: PartialEq>(previous: &Arc<T>, next: Option<T>, changed: &mut bool) -> Arc<T> {
    match next {
        Some(next) if **previous != next => {
            *changed = true;
            Arc::new(next)
        }
        _ => Arc::clone(previous),
    }
}

fn diff_slice<T: PartialEq>(
    previous: &Arc<[T]>,
    next: Option<Vec<T>>,
    changed: &mut bool,
) -> Arc<[T]> {
    match next {
        Some(next) if previous[..] != next[..] => {
            *changed = true;
            next.into()
        }
        _ => Arc::clone(previous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::Rng;
    use walletsync_domain::entities::operation_list;
    use walletsync_domain::enums::OperationType;

    const PARENT: &str = "evm:ethereum:0xabc";

    fn update(token: &str, balance: u64) -> SubAccountUpdate {
        SubAccountUpdate::new(PARENT, token, Amount::from(balance))
    }

    fn token_op(token: &str, hash: &str, value: u64) -> Operation {
        let account_id = SubAccount::encode_id(PARENT, token);
        let date = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Operation::new(account_id, hash, OperationType::In, Amount::from(value), date)
    }

    fn delta(balance: u64) -> AccountDelta {
        AccountDelta {
            family: Family::Evm,
            currency_id: "ethereum".to_string(),
            address: "0xabc".to_string(),
            balance: Amount::from(balance),
            spendable_balance: Amount::from(balance),
            block_height: 100,
            balance_history_cache: None,
            swap_history: None,
            operations: Vec::new(),
            pending_operations: Vec::new(),
            nft_operations: Vec::new(),
            sub_accounts: Vec::new(),
            sync_hash: Some(SyncHash::new("0x01")),
            pending_cutoff: None,
        }
    }

    #[test]
    fn test_first_sync_takes_incoming_as_is() {
        let outcome =
            merge_sub_accounts(None, vec![update("a", 10), update("b", 5)], DuplicatePolicy::Reject)
                .unwrap();

        let ids: Vec<&str> = outcome.sub_accounts.iter().map(|s| s.token_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_unchanged_sub_account_keeps_reference_and_new_one_is_appended() {
        let previous =
            merge_sub_accounts(None, vec![update("a", 10)], DuplicatePolicy::Reject).unwrap();

        let outcome = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            vec![update("a", 10), update("b", 5)],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        assert_eq!(outcome.sub_accounts.len(), 2);
        assert!(Arc::ptr_eq(&outcome.sub_accounts[0], &previous.sub_accounts[0]));
        assert_eq!(outcome.sub_accounts[1].token_id, "b");
        assert_eq!(outcome.sub_accounts[1].balance, Amount::from(5u64));
    }

    #[test]
    fn test_changed_balance_creates_new_node_keeping_other_fields() {
        let previous =
            merge_sub_accounts(None, vec![update("a", 10)], DuplicatePolicy::Reject).unwrap();
        let before = &previous.sub_accounts[0];

        let outcome = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            vec![update("a", 11)],
            DuplicatePolicy::Reject,
        )
        .unwrap();
        let after = &outcome.sub_accounts[0];

        assert!(!Arc::ptr_eq(after, before));
        assert_eq!(after.balance, Amount::from(11u64));
        assert!(Arc::ptr_eq(&after.operations, &before.operations));
        assert!(Arc::ptr_eq(&after.balance_history_cache, &before.balance_history_cache));
    }

    #[test]
    fn test_previous_order_kept_before_new_entries() {
        let previous = merge_sub_accounts(
            None,
            vec![update("a", 1), update("b", 2)],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        let outcome = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            vec![update("c", 3), update("b", 20), update("a", 1)],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        let ids: Vec<&str> = outcome.sub_accounts.iter().map(|s| s.token_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(outcome.sub_accounts[1].balance, Amount::from(20u64));
    }

    #[test]
    fn test_operations_merge_updates_count() {
        let previous = merge_sub_accounts(
            None,
            vec![update("a", 1).with_operations(vec![token_op("a", "0x1", 1)])],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        let outcome = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            vec![update("a", 1).with_operations(vec![token_op("a", "0x2", 2)])],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        let merged = &outcome.sub_accounts[0];
        assert_eq!(merged.operations.len(), 2);
        assert_eq!(merged.operations_count, 2);
    }

    #[test]
    fn test_absent_optional_fields_keep_previous_values() {
        let swap = SwapOperation {
            provider: "changelly".to_string(),
            swap_id: "s1".to_string(),
            status: "finished".to_string(),
            receiver_account_id: "other".to_string(),
            operation_id: "op".to_string(),
            from_amount: Amount::from(1u64),
            to_amount: Amount::from(2u64),
        };
        let mut first = update("a", 1);
        first.swap_history = Some(vec![swap]);
        let previous = merge_sub_accounts(None, vec![first], DuplicatePolicy::Reject).unwrap();

        let outcome = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            vec![update("a", 1)],
            DuplicatePolicy::Reject,
        )
        .unwrap();

        assert!(Arc::ptr_eq(&outcome.sub_accounts[0], &previous.sub_accounts[0]));
        assert_eq!(outcome.sub_accounts[0].swap_history.len(), 1);
    }

    #[test]
    fn test_duplicates_rejected_by_default() {
        let result = merge_sub_accounts(
            None,
            vec![update("a", 1), update("a", 2)],
            DuplicatePolicy::Reject,
        );

        assert_eq!(
            result.unwrap_err(),
            ReconcileError::MergeInvariantViolation {
                ids: vec![SubAccount::encode_id(PARENT, "a")],
            }
        );
    }

    #[test]
    fn test_duplicates_last_write_wins_is_reported() {
        let outcome = merge_sub_accounts(
            None,
            vec![update("a", 1), update("b", 7), update("a", 2)],
            DuplicatePolicy::LastWriteWins,
        )
        .unwrap();

        assert_eq!(outcome.sub_accounts.len(), 2);
        assert_eq!(outcome.sub_accounts[0].balance, Amount::from(2u64));
        assert_eq!(outcome.duplicate_ids, [SubAccount::encode_id(PARENT, "a")]);
    }

    #[test]
    fn test_merge_is_idempotent_on_random_batches() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let previous_len = rng.random_range(0..5);
            let previous_batch: Vec<SubAccountUpdate> = (0..previous_len)
                .map(|i| update(&format!("t{i}"), rng.random_range(0..3)))
                .collect();
            let previous =
                merge_sub_accounts(None, previous_batch, DuplicatePolicy::Reject).unwrap();

            let incoming: Vec<SubAccountUpdate> = (0..rng.random_range(0..8))
                .map(|i| {
                    let token = format!("t{i}");
                    let ops = (0..rng.random_range(0..3))
                        .map(|n| token_op(&token, &format!("0x{i}{n}"), n))
                        .collect();
                    update(&token, rng.random_range(0..3)).with_operations(ops)
                })
                .collect();

            let once = merge_sub_accounts(
                Some(previous.sub_accounts.as_slice()),
                incoming.clone(),
                DuplicatePolicy::Reject,
            )
            .unwrap();
            let twice =
                merge_sub_accounts(Some(once.sub_accounts.as_slice()), incoming, DuplicatePolicy::Reject)
                    .unwrap();

            assert_eq!(once.sub_accounts, twice.sub_accounts);
            for (a, b) in once.sub_accounts.iter().zip(&twice.sub_accounts) {
                assert!(Arc::ptr_eq(a, b));
            }
        }
    }

    #[test]
    fn test_merge_is_idempotent_when_hash_is_pending_and_confirmed() {
        let batch = || {
            vec![
                update("a", 1)
                    .with_operations(vec![token_op("a", "0xh", 1).with_block_height(7)])
                    .with_pending_operations(vec![token_op("a", "0xh", 1)]),
            ]
        };

        let previous = merge_sub_accounts(None, batch(), DuplicatePolicy::Reject).unwrap();
        assert!(previous.sub_accounts[0].pending_operations.is_empty());

        let once = merge_sub_accounts(
            Some(previous.sub_accounts.as_slice()),
            batch(),
            DuplicatePolicy::Reject,
        )
        .unwrap();
        let twice =
            merge_sub_accounts(Some(once.sub_accounts.as_slice()), batch(), DuplicatePolicy::Reject)
                .unwrap();

        assert!(Arc::ptr_eq(&once.sub_accounts[0], &previous.sub_accounts[0]));
        assert!(Arc::ptr_eq(&twice.sub_accounts[0], &once.sub_accounts[0]));
    }

    #[test]
    fn test_merge_account_is_idempotent_when_hash_is_pending_and_confirmed() {
        let account_id = Account::encode_id(Family::Evm, "ethereum", "0xabc");
        let date = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let sent = Operation::new(&account_id, "0xh", OperationType::Out, Amount::from(1u64), date);
        let next = || {
            let mut next = delta(9);
            next.operations = vec![sent.clone().with_block_height(101)];
            next.pending_operations = vec![sent.clone()];
            next
        };

        let account = merge_account(None, next(), DuplicatePolicy::Reject).unwrap();
        let again = merge_account(Some(&account), next(), DuplicatePolicy::Reject).unwrap();
        let third = merge_account(Some(&again), next(), DuplicatePolicy::Reject).unwrap();

        assert!(account.pending_operations.is_empty());
        assert!(Arc::ptr_eq(&again, &account));
        assert!(Arc::ptr_eq(&third, &account));
    }

    #[test]
    fn test_merge_account_expires_dropped_pending() {
        let mut base = Account::empty(Family::Evm, "ethereum", "0xabc");
        let date = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let dropped = Operation::new(&base.id, "0xd", OperationType::Out, Amount::from(1u64), date);
        base.pending_operations = operation_list([dropped]);
        let base = Arc::new(base);

        let kept = merge_account(Some(&base), delta(10), DuplicatePolicy::Reject).unwrap();
        assert_eq!(kept.pending_operations.len(), 1);

        let mut next = delta(10);
        next.pending_cutoff = Some(date + chrono::Duration::minutes(30));
        let expired = merge_account(Some(&kept), next, DuplicatePolicy::Reject).unwrap();
        assert!(expired.pending_operations.is_empty());
    }

    #[test]
    fn test_merge_account_creates_account_on_first_sync() {
        let account = merge_account(None, delta(10), DuplicatePolicy::Reject).unwrap();

        assert_eq!(account.id, "evm:ethereum:0xabc");
        assert_eq!(account.balance, Amount::from(10u64));
        assert_eq!(account.sync_hash, Some(SyncHash::new("0x01")));
    }

    #[test]
    fn test_merge_account_unchanged_returns_same_arc() {
        let account = merge_account(None, delta(10), DuplicatePolicy::Reject).unwrap();
        let again = merge_account(Some(&account), delta(10), DuplicatePolicy::Reject).unwrap();
        assert!(Arc::ptr_eq(&account, &again));
    }

    #[test]
    fn test_merge_account_prunes_confirmed_pending() {
        let mut base = Account::empty(Family::Evm, "ethereum", "0xabc");
        let pending = Operation::new(&base.id, "0xp", OperationType::Out, Amount::from(1u64), Utc::now());
        base.pending_operations = operation_list([pending.clone()]);
        let base = Arc::new(base);

        let mut next = delta(9);
        next.operations = vec![pending.with_block_height(101)];
        let merged = merge_account(Some(&base), next, DuplicatePolicy::Reject).unwrap();

        assert!(merged.pending_operations.is_empty());
        assert_eq!(merged.operations_count, 1);
    }

    #[test]
    fn test_merge_account_rejects_foreign_delta() {
        let other = Arc::new(Account::empty(Family::Evm, "polygon", "0xabc"));
        let err = merge_account(Some(&other), delta(1), DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(err, ReconcileError::AccountMismatch { .. }));
    }
}
