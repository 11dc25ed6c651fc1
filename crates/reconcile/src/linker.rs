//! Links token and NFT operations to the coin operation of the same transaction.
//!
//! A token transfer or NFT move is the result of a coin-level transaction.
//! When that transaction belongs to the account, the child events are nested
//! under it instead of being listed on their own.

use std::collections::HashMap;
use tracing::debug;
use walletsync_domain::entities::Operation;

/// Result of [`link_operations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedOperations {
    /// Coin operations, with linked children attached.
    pub coin_operations: Vec<Operation>,
    /// Token operations with no matching coin operation.
    pub token_operations: Vec<Operation>,
    /// NFT operations with no matching coin operation.
    pub nft_operations: Vec<Operation>,
}

/// Nests token and NFT operations under the coin operation sharing their hash.
///
/// Inputs are never mutated; every returned operation is a fresh copy. A child
/// is attached to at most one coin operation and then dropped from its
/// standalone list. When two coin operations share a hash, the last one wins.
pub fn link_operations(
    coin: &[Operation],
    token: &[Operation],
    nft: &[Operation],
) -> LinkedOperations {
    let mut coin_operations = coin.to_vec();

    let by_hash: HashMap<&str, usize> = coin
        .iter()
        .enumerate()
        .map(|(index, op)| (op.hash.as_str(), index))
        .collect();

    let mut token_operations = Vec::with_capacity(token.len());
    let mut linked_tokens = 0usize;
    for op in token {
        match by_hash.get(op.hash.as_str()) {
            Some(&index) => {
                attach(&mut coin_operations[index].sub_operations, op);
                linked_tokens += 1;
            }
            None => token_operations.push(op.clone()),
        }
    }

    let mut nft_operations = Vec::with_capacity(nft.len());
    let mut linked_nfts = 0usize;
    for op in nft {
        match by_hash.get(op.hash.as_str()) {
            Some(&index) => {
                attach(&mut coin_operations[index].nft_operations, op);
                linked_nfts += 1;
            }
            None => nft_operations.push(op.clone()),
        }
    }

    debug!(
        coin = coin_operations.len(),
        linked_tokens,
        linked_nfts,
        standalone_tokens = token_operations.len(),
        standalone_nfts = nft_operations.len(),
        "Linked child operations"
    );

    LinkedOperations {
        coin_operations,
        token_operations,
        nft_operations,
    }
}

// A coin operation fetched with its children already attached keeps them as is.
fn attach(children: &mut Vec<Operation>, op: &Operation) {
    if !children.iter().any(|child| child.id == op.id) {
        children.push(op.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use walletsync_domain::enums::OperationType;
    use walletsync_domain::value_objects::Amount;

    fn op(account: &str, hash: &str, op_type: OperationType) -> Operation {
        Operation::new(account, hash, op_type, Amount::from(1u64), Utc::now())
    }

    #[test]
    fn test_token_operation_is_nested_under_coin_operation() {
        let coin = vec![op("acc", "0x1", OperationType::Fees)];
        let token = vec![op("acc+usdc", "0x1", OperationType::Out)];

        let linked = link_operations(&coin, &token, &[]);

        assert_eq!(linked.coin_operations.len(), 1);
        assert_eq!(linked.coin_operations[0].sub_operations, token);
        assert!(linked.token_operations.is_empty());
    }

    #[test]
    fn test_unmatched_children_stay_standalone() {
        let coin = vec![op("acc", "0x1", OperationType::Out)];
        let token = vec![op("acc+usdc", "0x2", OperationType::In)];
        let nft = vec![op("acc", "0x3", OperationType::NftIn)];

        let linked = link_operations(&coin, &token, &nft);

        assert!(!linked.coin_operations[0].has_children());
        assert_eq!(linked.token_operations, token);
        assert_eq!(linked.nft_operations, nft);
    }

    #[test]
    fn test_nft_operation_is_nested() {
        let coin = vec![op("acc", "0xa", OperationType::Fees)];
        let nft = vec![op("acc", "0xa", OperationType::NftOut)];

        let linked = link_operations(&coin, &[], &nft);

        assert_eq!(linked.coin_operations[0].nft_operations.len(), 1);
        assert!(linked.nft_operations.is_empty());
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let coin = vec![op("acc", "0x1", OperationType::Fees)];
        let token = vec![op("acc+usdc", "0x1", OperationType::Out)];
        let coin_before = coin.clone();

        let _ = link_operations(&coin, &token, &[]);

        assert_eq!(coin, coin_before);
        assert!(coin[0].sub_operations.is_empty());
    }

    #[test]
    fn test_hash_collision_links_to_last_coin_operation() {
        let coin = vec![
            op("acc", "0x1", OperationType::Out),
            op("acc", "0x1", OperationType::Fees),
        ];
        let token = vec![op("acc+usdc", "0x1", OperationType::Out)];

        let linked = link_operations(&coin, &token, &[]);

        assert!(linked.coin_operations[0].sub_operations.is_empty());
        assert_eq!(linked.coin_operations[1].sub_operations.len(), 1);
    }

    #[test]
    fn test_already_attached_child_is_not_duplicated() {
        let child = op("acc+usdc", "0x1", OperationType::Out);
        let mut parent = op("acc", "0x1", OperationType::Fees);
        parent.sub_operations.push(child.clone());

        let linked = link_operations(&[parent], &[child], &[]);

        assert_eq!(linked.coin_operations[0].sub_operations.len(), 1);
        assert!(linked.token_operations.is_empty());
    }
}
