//! Merge of operation lists across sync passes.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use walletsync_domain::entities::{Operation, OperationList};

/// Folds fetched operations into a previously known list.
///
/// Operations are matched by id. A known operation that came back identical
/// keeps its previous `Arc`; one that came back different is replaced where it
/// stands; unknown ones are appended in fetch order. Operations absent from
/// `fetched` are kept, since incremental fetches only return new history.
///
/// When nothing was added or replaced the previous list itself is returned.
pub fn merge_operations(existing: &OperationList, fetched: Vec<Operation>) -> OperationList {
    if fetched.is_empty() {
        return Arc::clone(existing);
    }

    let known: HashMap<&str, usize> = existing
        .iter()
        .enumerate()
        .map(|(index, op)| (op.id.as_str(), index))
        .collect();

    let mut replaced: HashMap<usize, Arc<Operation>> = HashMap::new();
    let mut appended: Vec<Arc<Operation>> = Vec::new();
    let mut appended_at: HashMap<String, usize> = HashMap::new();

    for op in fetched {
        if let Some(&index) = known.get(op.id.as_str()) {
            if *existing[index] == op {
                replaced.remove(&index);
            } else {
                replaced.insert(index, Arc::new(op));
            }
        } else if let Some(&slot) = appended_at.get(&op.id) {
            appended[slot] = Arc::new(op);
        } else {
            appended_at.insert(op.id.clone(), appended.len());
            appended.push(Arc::new(op));
        }
    }

    if replaced.is_empty() && appended.is_empty() {
        return Arc::clone(existing);
    }

    existing
        .iter()
        .enumerate()
        .map(|(index, op)| replaced.remove(&index).unwrap_or_else(|| Arc::clone(op)))
        .chain(appended)
        .collect()
}

/// Drops pending operations whose transaction now appears in `confirmed`.
///
/// Returns the pending list itself when nothing was dropped.
pub fn prune_confirmed(pending: &OperationList, confirmed: &OperationList) -> OperationList {
    if pending.is_empty() {
        return Arc::clone(pending);
    }

    let confirmed_hashes: HashSet<&str> = confirmed.iter().map(|op| op.hash.as_str()).collect();
    if !pending
        .iter()
        .any(|op| confirmed_hashes.contains(op.hash.as_str()))
    {
        return Arc::clone(pending);
    }

    pending
        .iter()
        .filter(|op| !confirmed_hashes.contains(op.hash.as_str()))
        .cloned()
        .collect()
}

/// Folds fetched pending operations into the previously pending ones.
///
/// Operations whose hash appears in `confirmed` are dropped from both lists,
/// so a backend reporting a transaction as pending and mined in the same
/// fetch does not produce a new list. Previously pending operations dated
/// before `cutoff` that the fetch no longer reports are dropped as well: they
/// left the mempool without being mined.
///
/// Returns the previous list itself when the result holds the same operations.
pub fn merge_pending(
    previous: &OperationList,
    fetched: Vec<Operation>,
    confirmed: &OperationList,
    cutoff: Option<DateTime<Utc>>,
) -> OperationList {
    let live = prune_confirmed(previous, confirmed);
    let live = match cutoff {
        Some(cutoff) => {
            let reported: HashSet<&str> = fetched.iter().map(|op| op.id.as_str()).collect();
            drop_expired(&live, cutoff, &reported)
        }
        None => live,
    };

    let confirmed_hashes: HashSet<&str> = confirmed.iter().map(|op| op.hash.as_str()).collect();
    let fetched: Vec<Operation> = fetched
        .into_iter()
        .filter(|op| !confirmed_hashes.contains(op.hash.as_str()))
        .collect();

    let merged = merge_operations(&live, fetched);
    if same_operations(&merged, previous) {
        return Arc::clone(previous);
    }
    merged
}

fn drop_expired(
    pending: &OperationList,
    cutoff: DateTime<Utc>,
    reported: &HashSet<&str>,
) -> OperationList {
    let is_expired = |op: &Arc<Operation>| op.date < cutoff && !reported.contains(op.id.as_str());
    let expired = pending.iter().filter(|op| is_expired(op)).count();
    if expired == 0 {
        return Arc::clone(pending);
    }
    debug!(expired, "Dropping pending operations no longer reported");
    pending.iter().filter(|op| !is_expired(op)).cloned().collect()
}

fn same_operations(a: &OperationList, b: &OperationList) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Arc::ptr_eq(x, y))
}
