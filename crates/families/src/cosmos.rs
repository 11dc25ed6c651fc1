//! Cosmos SDK family.

use crate::bridge::{
    AccountBridge, AccountShape, FeeParams, PreparedTransaction, SignedTransaction, SyncRequest,
    TransactionIntent, TransactionMode,
};
use crate::common::{BridgeCore, ensure_covers};
use crate::config::{ChainParams, CosmosParams};
use crate::error::BridgeError;
use crate::source::ChainDataSource;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use walletsync_cache::CacheConfig;
use walletsync_domain::entities::{Account, Operation};
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::Amount;

/// Fee of a message using `gas` at `gas_price`, rounded up.
pub fn estimate_fee(gas: u64, gas_price: Decimal) -> Option<Amount> {
    Decimal::from(gas)
        .checked_mul(gas_price)?
        .ceil()
        .to_u64()
        .map(Amount::from)
}

pub struct CosmosBridge {
    core: BridgeCore,
}

impl CosmosBridge {
    pub fn new(source: Arc<dyn ChainDataSource>, cache_config: CacheConfig) -> Self {
        Self {
            core: BridgeCore::new(Family::Cosmos, source, cache_config),
        }
    }

    fn params(&self, currency_id: &str) -> Result<&'static CosmosParams, BridgeError> {
        match &self.core.chain(currency_id)?.params {
            ChainParams::Cosmos(params) => Ok(params),
            _ => Err(BridgeError::UnknownCurrency(currency_id.to_string())),
        }
    }
}

#[async_trait]
impl AccountBridge for CosmosBridge {
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
        if intent.token_id.is_some() {
            return Err(BridgeError::TokensUnsupported(Family::Cosmos));
        }
        let params = self.params(&account.currency_id)?;
        let gas = params.gas.for_mode(intent.mode);
        let estimated =
            estimate_fee(gas, params.min_gas_price).ok_or(BridgeError::FeeOverflow)?;

        // Only sends and delegations move funds out of the spendable balance.
        match intent.mode {
            TransactionMode::Send | TransactionMode::Delegate => {
                ensure_covers(account.spendable_balance, &[intent.amount, estimated])?
            }
            _ => ensure_covers(account.spendable_balance, &[estimated])?,
        }

        Ok(PreparedTransaction {
            account_id: account.id.clone(),
            currency_id: account.currency_id.clone(),
            intent: intent.clone(),
            fee_params: FeeParams::Cosmos {
                gas,
                gas_price: params.min_gas_price,
            },
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
    use crate::source::InMemorySource;
    use rust_decimal_macros::dec;

    fn bridge() -> CosmosBridge {
        CosmosBridge::new(Arc::new(InMemorySource::new()), CacheConfig::default())
    }

    fn account(currency: &str, spendable: u64) -> Account {
        let mut account = Account::empty(Family::Cosmos, currency, "cosmos1abc");
        account.balance = Amount::from(spendable);
        account.spendable_balance = Amount::from(spendable);
        account
    }

    #[test]
    fn test_estimate_fee_rounds_up() {
        assert_eq!(estimate_fee(87_500, dec!(0.007)), Some(Amount::from(613u64)));
        assert_eq!(estimate_fee(100_000, dec!(0.025)), Some(Amount::from(2_500u64)));
    }

    #[tokio::test]
    async fn test_gas_depends_on_mode() {
        let bridge = bridge();
        let account = account("axelar", 10_000_000);

        let send = bridge
            .prepare_transaction(
                &account,
                &TransactionIntent::send("axelar1dest", Amount::from(1_000u64)),
            )
            .await
            .unwrap();
        let claim = bridge
            .prepare_transaction(
                &account,
                &TransactionIntent::send("axelarvaloper1v", Amount::zero())
                    .with_mode(TransactionMode::ClaimRewardCompound),
            )
            .await
            .unwrap();

        assert_eq!(
            send.fee_params,
            FeeParams::Cosmos {
                gas: 87_500,
                gas_price: dec!(0.007)
            }
        );
        assert_eq!(claim.estimated_fees, Amount::from(2_800u64));
    }

    #[tokio::test]
    async fn test_undelegate_only_needs_fees() {
        let bridge = bridge();
        let account = account("cosmos", 10_000);

        let undelegate = TransactionIntent::send("cosmosvaloper1v", Amount::from(1_000_000u64))
            .with_mode(TransactionMode::Undelegate);
        assert!(bridge.prepare_transaction(&account, &undelegate).await.is_ok());

        let delegate = undelegate.clone().with_mode(TransactionMode::Delegate);
        assert!(matches!(
            bridge.prepare_transaction(&account, &delegate).await,
            Err(BridgeError::NotEnoughBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_tokens_are_unsupported() {
        let intent = TransactionIntent::send("osmo1dest", Amount::from(1u64)).with_token("ibc/27");
        let result = bridge()
            .prepare_transaction(&account("osmosis", 1_000_000), &intent)
            .await;
        assert!(matches!(result, Err(BridgeError::TokensUnsupported(Family::Cosmos))));
    }
}
