//! Behavior shared by every bridge: cached fetches, conversion of raw backend
//! records into account-shaped deltas, and optimistic operations.

use crate::bridge::{AccountShape, SignedTransaction, SyncRequest, TransactionMode};
use crate::config::{ChainConfig, find_chain};
use crate::error::BridgeError;
use crate::source::{ChainDataSource, FetchRequest, RawAccountState, RawFeeData};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use walletsync_cache::{Cache, CacheConfig, CacheKey};
use walletsync_domain::entities::{Account, Operation, SubAccount, SubAccountUpdate};
use walletsync_domain::enums::{Family, OperationType};
use walletsync_domain::value_objects::Amount;

/// Fee conditions move slowly compared to account history.
const FEE_DATA_MAX_AGE: Duration = Duration::from_secs(30);

pub(crate) struct BridgeCore {
    family: Family,
    source: Arc<dyn ChainDataSource>,
    accounts: Cache<RawAccountState>,
    fees: Cache<RawFeeData>,
}

impl BridgeCore {
    pub(crate) fn new(
        family: Family,
        source: Arc<dyn ChainDataSource>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            family,
            source,
            accounts: Cache::new(cache_config.clone()),
            fees: Cache::new(cache_config),
        }
    }

    pub(crate) fn family(&self) -> Family {
        self.family
    }

    /// Chain row of `currency_id`, provided it belongs to this family.
    pub(crate) fn chain(&self, currency_id: &str) -> Result<&'static ChainConfig, BridgeError> {
        find_chain(currency_id)
            .filter(|chain| chain.currency.family == self.family)
            .ok_or_else(|| BridgeError::UnknownCurrency(currency_id.to_string()))
    }

    pub(crate) async fn fetch_account(
        &self,
        request: &FetchRequest,
    ) -> Result<RawAccountState, BridgeError> {
        let key = CacheKey::new(self.family, "fetch_account", request)?;
        let state = self
            .accounts
            .get_or_compute(&key, || self.source.fetch_account(request))
            .await?;
        Ok(state)
    }

    pub(crate) async fn fetch_fee_data(&self, currency_id: &str) -> Result<RawFeeData, BridgeError> {
        let key = CacheKey::new(self.family, "fetch_fee_data", &currency_id)?;
        let data = self
            .fees
            .get_or_compute_with(&key, Some(FEE_DATA_MAX_AGE), || {
                self.source.fetch_fee_data(currency_id)
            })
            .await?;
        Ok(data)
    }

    /// Fetches and shapes the state of the requested address.
    pub(crate) async fn sync(&self, request: &SyncRequest) -> Result<AccountShape, BridgeError> {
        self.chain(&request.currency.id)?;
        let fetch = FetchRequest {
            currency_id: request.currency.id.clone(),
            address: request.address.clone(),
            since_block: request.since_block,
        };
        let raw = self.fetch_account(&fetch).await?;
        Ok(shape_account(&request.account_id, raw))
    }

    /// Broadcasts through the data source and builds the optimistic operation.
    pub(crate) async fn broadcast(
        &self,
        account: &Account,
        signed: &SignedTransaction,
    ) -> Result<Operation, BridgeError> {
        let hash = self
            .source
            .broadcast(&account.currency_id, &signed.payload)
            .await?;
        debug!(
            account_id = %account.id,
            hash = %hash,
            family = %self.family,
            "Broadcasted transaction"
        );
        Ok(optimistic_operation(account, signed, hash))
    }
}

/// Splits raw backend state into coin operations, token operations grouped
/// under sub-accounts, NFT operations and mempool operations.
pub(crate) fn shape_account(account_id: &str, raw: RawAccountState) -> AccountShape {
    let mut coin_operations = Vec::new();
    let mut pending_operations = Vec::new();
    for raw_op in raw.coin_operations {
        let op = raw_op.into_operation(account_id);
        if op.is_confirmed() {
            coin_operations.push(op);
        } else {
            pending_operations.push(op);
        }
    }

    let mut sub_accounts: Vec<SubAccountUpdate> = raw
        .token_balances
        .into_iter()
        .map(|token| {
            let spendable = token.spendable_balance.unwrap_or(token.balance);
            SubAccountUpdate::new(account_id, token.token_id, token.balance)
                .with_spendable_balance(spendable)
        })
        .collect();

    let mut token_operations = Vec::with_capacity(raw.token_operations.len());
    for raw_op in raw.token_operations {
        let Some(token_id) = raw_op.contract.clone() else {
            warn!(account_id = %account_id, hash = %raw_op.hash, "Token operation without token id, skipped");
            continue;
        };
        let sub_id = SubAccount::encode_id(account_id, &token_id);
        let op = raw_op.into_operation(&sub_id);

        let index = match sub_accounts.iter().position(|sub| sub.id == sub_id) {
            Some(index) => index,
            None => {
                sub_accounts.push(SubAccountUpdate::new(account_id, token_id, Amount::zero()));
                sub_accounts.len() - 1
            }
        };
        let sub = &mut sub_accounts[index];
        if op.is_confirmed() {
            sub.operations.push(op.clone());
            token_operations.push(op);
        } else {
            sub.pending_operations.push(op);
        }
    }

    let nft_operations = raw
        .nft_operations
        .into_iter()
        .map(|raw_op| raw_op.into_operation(account_id))
        .collect();

    AccountShape {
        spendable_balance: raw.spendable_balance.unwrap_or(raw.balance),
        balance: raw.balance,
        block_height: raw.block_height,
        coin_operations,
        token_operations,
        nft_operations,
        pending_operations,
        sub_accounts,
    }
}

fn operation_type(mode: TransactionMode) -> OperationType {
    match mode {
        TransactionMode::Send => OperationType::Out,
        TransactionMode::Delegate => OperationType::Delegate,
        TransactionMode::Undelegate => OperationType::Undelegate,
        TransactionMode::Redelegate => OperationType::Redelegate,
        TransactionMode::ClaimReward | TransactionMode::ClaimRewardCompound => {
            OperationType::Reward
        }
    }
}

/// Operation representing a just-broadcast transaction until a sync sees it.
///
/// Token transfers are a fee-paying coin operation with the token transfer
/// nested as a sub-operation of the token's sub-account.
pub(crate) fn optimistic_operation(
    account: &Account,
    signed: &SignedTransaction,
    hash: String,
) -> Operation {
    let tx = &signed.transaction;
    let intent = &tx.intent;
    let now = Utc::now();
    let senders = vec![account.address.clone()];
    let recipients = vec![intent.recipient.clone()];

    match &intent.token_id {
        Some(token_id) => {
            let sub_id = SubAccount::encode_id(&account.id, token_id);
            let transfer = Operation::new(&sub_id, &hash, OperationType::Out, intent.amount, now)
                .with_fee(tx.estimated_fees)
                .with_senders(senders.clone())
                .with_recipients(recipients.clone())
                .with_contract(token_id);
            let mut op = Operation::new(
                &account.id,
                hash,
                OperationType::Fees,
                tx.estimated_fees,
                now,
            )
            .with_fee(tx.estimated_fees)
            .with_senders(senders)
            .with_recipients(recipients);
            op.sub_operations.push(transfer);
            op
        }
        None => {
            let op_type = operation_type(intent.mode);
            let value = match op_type {
                OperationType::Out => intent
                    .amount
                    .checked_add(tx.estimated_fees)
                    .unwrap_or(intent.amount),
                OperationType::Reward => tx.estimated_fees,
                _ => intent.amount,
            };
            Operation::new(&account.id, hash, op_type, value, now)
                .with_fee(tx.estimated_fees)
                .with_senders(senders)
                .with_recipients(recipients)
        }
    }
}

/// Fails with `NotEnoughBalance` unless `available` covers every amount.
pub(crate) fn ensure_covers(available: Amount, amounts: &[Amount]) -> Result<(), BridgeError> {
    let required = amounts
        .iter()
        .try_fold(Amount::zero(), |total, amount| total.checked_add(*amount))
        .ok_or(BridgeError::FeeOverflow)?;
    if required > available {
        return Err(BridgeError::NotEnoughBalance {
            required,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{FeeParams, PreparedTransaction, TransactionIntent};
    use crate::source::{RawOperation, RawTokenBalance};

    fn raw(hash: &str, op_type: OperationType, height: Option<u64>, contract: Option<&str>) -> RawOperation {
        RawOperation {
            hash: hash.to_string(),
            op_type,
            value: Amount::from(1u64),
            fee: Amount::zero(),
            senders: vec![],
            recipients: vec![],
            block_height: height,
            date: Utc::now(),
            contract: contract.map(str::to_string),
        }
    }

    #[test]
    fn test_shape_groups_token_operations_by_sub_account() {
        let raw_state = RawAccountState {
            balance: Amount::from(100u64),
            spendable_balance: None,
            block_height: 10,
            coin_operations: vec![
                raw("0x1", OperationType::Fees, Some(9), None),
                raw("0x2", OperationType::Out, None, None),
            ],
            token_operations: vec![
                raw("0x1", OperationType::Out, Some(9), Some("ethereum/erc20/usdc")),
                raw("0x3", OperationType::In, Some(8), Some("ethereum/erc20/dai")),
            ],
            nft_operations: vec![],
            token_balances: vec![RawTokenBalance {
                token_id: "ethereum/erc20/usdc".to_string(),
                balance: Amount::from(5u64),
                spendable_balance: None,
            }],
        };

        let shape = shape_account("evm:ethereum:0xabc", raw_state);

        assert_eq!(shape.spendable_balance, Amount::from(100u64));
        assert_eq!(shape.coin_operations.len(), 1);
        assert_eq!(shape.pending_operations.len(), 1);
        assert_eq!(shape.token_operations.len(), 2);

        let ids: Vec<&str> = shape.sub_accounts.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "evm:ethereum:0xabc+ethereum/erc20/usdc",
                "evm:ethereum:0xabc+ethereum/erc20/dai"
            ]
        );
        assert_eq!(shape.sub_accounts[0].operations[0].account_id, ids[0]);
        assert!(shape.sub_accounts[1].balance.is_zero());
    }

    #[test]
    fn test_token_operation_without_token_id_is_skipped() {
        let raw_state = RawAccountState {
            token_operations: vec![raw("0x1", OperationType::In, Some(1), None)],
            ..Default::default()
        };
        let shape = shape_account("acc", raw_state);
        assert!(shape.token_operations.is_empty());
        assert!(shape.sub_accounts.is_empty());
    }

    fn signed(intent: TransactionIntent) -> SignedTransaction {
        SignedTransaction {
            transaction: PreparedTransaction {
                account_id: "evm:ethereum:0xabc".to_string(),
                currency_id: "ethereum".to_string(),
                intent,
                fee_params: FeeParams::Utxo {
                    fee_per_vbyte: 1,
                    vbytes: 1,
                },
                estimated_fees: Amount::from(3u64),
            },
            payload: "0xsigned".to_string(),
        }
    }

    #[test]
    fn test_optimistic_coin_operation() {
        let account = Account::empty(Family::Evm, "ethereum", "0xabc");
        let op = optimistic_operation(
            &account,
            &signed(TransactionIntent::send("0xdef", Amount::from(10u64))),
            "0xfeed".to_string(),
        );

        assert_eq!(op.op_type, OperationType::Out);
        assert_eq!(op.value, Amount::from(13u64));
        assert_eq!(op.recipients, ["0xdef"]);
        assert!(!op.is_confirmed());
    }

    #[test]
    fn test_optimistic_token_operation_nests_transfer() {
        let account = Account::empty(Family::Evm, "ethereum", "0xabc");
        let intent =
            TransactionIntent::send("0xdef", Amount::from(10u64)).with_token("ethereum/erc20/usdc");
        let op = optimistic_operation(&account, &signed(intent), "0xfeed".to_string());

        assert_eq!(op.op_type, OperationType::Fees);
        assert_eq!(op.sub_operations.len(), 1);
        assert_eq!(op.sub_operations[0].hash, op.hash);
        assert_eq!(
            op.sub_operations[0].account_id,
            "evm:ethereum:0xabc+ethereum/erc20/usdc"
        );
    }

    #[test]
    fn test_ensure_covers() {
        let available = Amount::from(10u64);
        assert!(ensure_covers(available, &[Amount::from(4u64), Amount::from(6u64)]).is_ok());
        assert!(matches!(
            ensure_covers(available, &[Amount::from(11u64)]),
            Err(BridgeError::NotEnoughBalance { .. })
        ));
    }
}
