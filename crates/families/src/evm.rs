//! EVM family: fee helpers and bridge.

use crate::bridge::{
    AccountBridge, AccountShape, FeeParams, PreparedTransaction, SignedTransaction, SyncRequest,
    TransactionIntent, TransactionMode,
};
use crate::common::{BridgeCore, ensure_covers};
use crate::config::{ChainParams, EvmParams, Layer2};
use crate::error::BridgeError;
use crate::source::ChainDataSource;
use async_trait::async_trait;
use primitive_types::U256;
use std::sync::Arc;
use walletsync_cache::CacheConfig;
use walletsync_domain::entities::{Account, CryptoCurrency, Operation};
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::Amount;

/// Selector of ERC-20 `transfer(address,uint256)`.
const ERC20_TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Fee-relevant fields of an EVM transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvmTransaction {
    /// 0 for legacy, 2 for EIP-1559.
    pub tx_type: u8,
    pub gas_limit: Amount,
    pub gas_price: Option<Amount>,
    pub max_fee_per_gas: Option<Amount>,
    pub max_priority_fee_per_gas: Option<Amount>,
    pub data: Vec<u8>,
}

/// Whether a legacy transaction carries its fee field.
pub fn legacy_transaction_has_fees(tx: &EvmTransaction) -> bool {
    tx.tx_type < 2 && tx.gas_price.is_some()
}

/// Whether an EIP-1559 transaction carries both of its fee fields.
pub fn eip1559_transaction_has_fees(tx: &EvmTransaction) -> bool {
    tx.tx_type == 2 && tx.max_fee_per_gas.is_some() && tx.max_priority_fee_per_gas.is_some()
}

/// Maximum fee a transaction can pay, depending on its type.
pub fn estimated_fees(tx: &EvmTransaction) -> Amount {
    let price = if tx.tx_type != 2 {
        tx.gas_price
    } else {
        tx.max_fee_per_gas
    };
    price.map_or_else(Amount::zero, |price| {
        Amount::new(price.as_u256().saturating_mul(tx.gas_limit.as_u256()))
    })
}

fn calldata_gas(data: &[u8]) -> u64 {
    data.iter().map(|&byte| if byte == 0 { 4 } else { 16 }).sum()
}

/// Fees a layer 2 charges to settle the transaction on layer 1.
///
/// `None` for chains that are not rollups.
pub fn additional_layer2_fees(
    params: &EvmParams,
    tx: &EvmTransaction,
    l1_gas_price: Amount,
) -> Option<Amount> {
    match params.layer2? {
        Layer2::Optimism {
            l1_fee_overhead,
            l1_fee_scalar_ppm,
        } => {
            let l1_gas = U256::from(calldata_gas(&tx.data) + l1_fee_overhead);
            let fee = l1_gas
                .saturating_mul(l1_gas_price.as_u256())
                .saturating_mul(U256::from(l1_fee_scalar_ppm))
                / U256::from(1_000_000u64);
            Some(Amount::new(fee))
        }
    }
}

/// Call data of an ERC-20 transfer of `amount` to `recipient`.
pub fn erc20_transfer_data(recipient: &str, amount: Amount) -> Result<Vec<u8>, BridgeError> {
    let address = hex::decode(recipient.trim_start_matches("0x"))
        .ok()
        .filter(|bytes| bytes.len() == 20)
        .ok_or_else(|| BridgeError::InvalidRecipient(recipient.to_string()))?;

    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&ERC20_TRANSFER);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&address);
    let value = amount.as_u256();
    data.extend((0..32).rev().map(|index| value.byte(index)));
    Ok(data)
}

pub struct EvmBridge {
    core: BridgeCore,
}

impl EvmBridge {
    pub fn new(source: Arc<dyn ChainDataSource>, cache_config: CacheConfig) -> Self {
        Self {
            core: BridgeCore::new(Family::Evm, source, cache_config),
        }
    }

    fn params(&self, currency: &str) -> Result<(&'static CryptoCurrency, &'static EvmParams), BridgeError> {
        let chain = self.core.chain(currency)?;
        match &chain.params {
            ChainParams::Evm(params) => Ok((&chain.currency, params)),
            _ => Err(BridgeError::UnknownCurrency(currency.to_string())),
        }
    }
}

#[async_trait]
impl AccountBridge for EvmBridge {
    fn family(&self) -> Family {
        self.core.family()
    }

    async fn sync(&self, request: &SyncRequest) -> Result<AccountShape, BridgeError> {
        self.core.sync(request).await
    }

    async fn prepare_transaction(
        &self,
        account: &Account,
        intent: &TransactionIntent,
    ) -> Result<PreparedTransaction, BridgeError> {
        if intent.mode != TransactionMode::Send {
            return Err(BridgeError::UnsupportedIntent {
                family: Family::Evm,
                mode: intent.mode,
            });
        }
        let (currency, params) = self.params(&account.currency_id)?;
        let fee_data = self.core.fetch_fee_data(&currency.id).await?;

        let (gas_limit, data) = match &intent.token_id {
            Some(_) => (
                params.token_gas_limit,
                erc20_transfer_data(&intent.recipient, intent.amount)?,
            ),
            None => (params.gas_limit, Vec::new()),
        };

        let mut tx = EvmTransaction {
            gas_limit: Amount::from(gas_limit),
            data,
            ..Default::default()
        };
        if params.eip1559 && fee_data.max_fee_per_gas.is_some() {
            tx.tx_type = 2;
            tx.max_fee_per_gas = fee_data.max_fee_per_gas;
            tx.max_priority_fee_per_gas =
                Some(fee_data.max_priority_fee_per_gas.unwrap_or_default());
        } else {
            tx.gas_price = fee_data.gas_price;
        }
        if !legacy_transaction_has_fees(&tx) && !eip1559_transaction_has_fees(&tx) {
            return Err(BridgeError::MissingFeeData(currency.id.clone()));
        }

        let l2_fees = additional_layer2_fees(params, &tx, fee_data.l1_gas_price.unwrap_or_default())
            .unwrap_or_default();
        let estimated = estimated_fees(&tx)
            .checked_add(l2_fees)
            .ok_or(BridgeError::FeeOverflow)?;

        match &intent.token_id {
            Some(token_id) => {
                let sub = account.sub_account_for_token(token_id).ok_or_else(|| {
                    BridgeError::UnknownToken {
                        account_id: account.id.clone(),
                        token_id: token_id.clone(),
                    }
                })?;
                ensure_covers(sub.spendable_balance, &[intent.amount])?;
                ensure_covers(account.spendable_balance, &[estimated])?;
            }
            None => ensure_covers(account.spendable_balance, &[intent.amount, estimated])?,
        }

        Ok(PreparedTransaction {
            account_id: account.id.clone(),
            currency_id: currency.id.clone(),
            intent: intent.clone(),
            fee_params: FeeParams::Evm(tx),
            estimated_fees: estimated,
        })
    }

    async fn broadcast(
        &self,
        account: &Account,
        signed: &SignedTransaction,
    ) -> Result<Operation, BridgeError> {
        self.core.broadcast(account, signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::find_chain;
    use crate::source::{InMemorySource, RawFeeData};
    use walletsync_domain::entities::{SubAccount, SubAccountUpdate};

    fn gwei(n: u64) -> Amount {
        Amount::from(n * 1_000_000_000)
    }

    fn evm_params(id: &str) -> &'static EvmParams {
        match &find_chain(id).unwrap().params {
            ChainParams::Evm(params) => params,
            _ => panic!("{id} is an evm chain"),
        }
    }

    #[test]
    fn test_fee_presence_checks() {
        let legacy = EvmTransaction {
            gas_price: Some(gwei(1)),
            ..Default::default()
        };
        assert!(legacy_transaction_has_fees(&legacy));
        assert!(!eip1559_transaction_has_fees(&legacy));

        let eip1559 = EvmTransaction {
            tx_type: 2,
            max_fee_per_gas: Some(gwei(30)),
            max_priority_fee_per_gas: Some(gwei(2)),
            ..Default::default()
        };
        assert!(eip1559_transaction_has_fees(&eip1559));
        assert!(!legacy_transaction_has_fees(&eip1559));

        let incomplete = EvmTransaction {
            tx_type: 2,
            max_fee_per_gas: Some(gwei(30)),
            ..Default::default()
        };
        assert!(!eip1559_transaction_has_fees(&incomplete));
    }

    #[test]
    fn test_estimated_fees_by_type() {
        let legacy = EvmTransaction {
            gas_limit: Amount::from(21_000u64),
            gas_price: Some(gwei(10)),
            max_fee_per_gas: Some(gwei(99)),
            ..Default::default()
        };
        assert_eq!(estimated_fees(&legacy), Amount::from(210_000_000_000_000u64));

        let eip1559 = EvmTransaction {
            tx_type: 2,
            ..legacy.clone()
        };
        assert_eq!(estimated_fees(&eip1559), Amount::from(2_079_000_000_000_000u64));

        let no_price = EvmTransaction {
            tx_type: 2,
            gas_limit: Amount::from(21_000u64),
            ..Default::default()
        };
        assert!(estimated_fees(&no_price).is_zero());
    }

    #[test]
    fn test_layer2_fees_only_for_optimism() {
        let tx = EvmTransaction {
            data: vec![0, 1],
            ..Default::default()
        };
        assert_eq!(
            additional_layer2_fees(evm_params("ethereum"), &tx, Amount::from(10u64)),
            None
        );

        // (4 + 16 + 188) * 10 * 0.684
        assert_eq!(
            additional_layer2_fees(evm_params("optimism"), &tx, Amount::from(10u64)),
            Some(Amount::from(1_422u64))
        );
        assert!(additional_layer2_fees(evm_params("optimism_goerli"), &tx, Amount::zero()).is_some());
    }

    #[test]
    fn test_erc20_transfer_data() {
        let data = erc20_transfer_data(
            "0x00000000000000000000000000000000000000aa",
            Amount::from(258u64),
        )
        .unwrap();
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &ERC20_TRANSFER);
        assert_eq!(data[35], 0xaa);
        assert_eq!(&data[66..], &[1, 2]);

        assert!(matches!(
            erc20_transfer_data("0x1234", Amount::zero()),
            Err(BridgeError::InvalidRecipient(_))
        ));
    }

    async fn bridge_with_fees(data: RawFeeData) -> EvmBridge {
        let source = InMemorySource::new();
        source.set_fee_data("ethereum", data).await;
        EvmBridge::new(Arc::new(source), CacheConfig::default())
    }

    fn funded_account(balance: u64) -> Account {
        let mut account = Account::empty(Family::Evm, "ethereum", "0xabc");
        account.balance = Amount::from(balance);
        account.spendable_balance = Amount::from(balance);
        account
    }

    #[tokio::test]
    async fn test_prepare_native_transfer() {
        let bridge = bridge_with_fees(RawFeeData {
            max_fee_per_gas: Some(Amount::from(10u64)),
            max_priority_fee_per_gas: Some(Amount::from(1u64)),
            ..Default::default()
        })
        .await;
        let account = funded_account(1_000_000);

        let prepared = bridge
            .prepare_transaction(
                &account,
                &TransactionIntent::send("0xdef", Amount::from(1_000u64)),
            )
            .await
            .unwrap();

        assert_eq!(prepared.estimated_fees, Amount::from(210_000u64));
        assert!(matches!(&prepared.fee_params, FeeParams::Evm(tx) if tx.tx_type == 2));
    }

    #[tokio::test]
    async fn test_prepare_rejects_insufficient_balance() {
        let bridge = bridge_with_fees(RawFeeData {
            gas_price: Some(Amount::from(10u64)),
            ..Default::default()
        })
        .await;
        let account = funded_account(210_000);

        let result = bridge
            .prepare_transaction(&account, &TransactionIntent::send("0xdef", Amount::from(1u64)))
            .await;
        assert!(matches!(result, Err(BridgeError::NotEnoughBalance { .. })));
    }

    #[tokio::test]
    async fn test_prepare_token_transfer_checks_sub_account() {
        let bridge = bridge_with_fees(RawFeeData {
            gas_price: Some(Amount::from(1u64)),
            ..Default::default()
        })
        .await;
        let mut account = funded_account(1_000_000);
        let intent = TransactionIntent::send(
            "0x00000000000000000000000000000000000000aa",
            Amount::from(50u64),
        )
        .with_token("ethereum/erc20/usdc");

        let missing = bridge.prepare_transaction(&account, &intent).await;
        assert!(matches!(missing, Err(BridgeError::UnknownToken { .. })));

        let sub: SubAccount =
            SubAccountUpdate::new(&account.id, "ethereum/erc20/usdc", Amount::from(100u64)).into();
        account.sub_accounts.push(Arc::new(sub));

        let prepared = bridge.prepare_transaction(&account, &intent).await.unwrap();
        assert_eq!(prepared.estimated_fees, Amount::from(65_000u64));
    }

    #[tokio::test]
    async fn test_prepare_without_fee_data_fails() {
        let bridge = bridge_with_fees(RawFeeData::default()).await;
        let result = bridge
            .prepare_transaction(
                &funded_account(1_000),
                &TransactionIntent::send("0xdef", Amount::from(1u64)),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::MissingFeeData(_))));
    }

    #[tokio::test]
    async fn test_staking_is_unsupported() {
        let bridge = bridge_with_fees(RawFeeData::default()).await;
        let intent = TransactionIntent::send("0xdef", Amount::from(1u64))
            .with_mode(TransactionMode::Delegate);
        let result = bridge.prepare_transaction(&funded_account(1_000), &intent).await;
        assert!(matches!(result, Err(BridgeError::UnsupportedIntent { .. })));
    }
}
