//! Bitcoin-like family.

use crate::bridge::{
    AccountBridge, AccountShape, FeeParams, PreparedTransaction, SignedTransaction, SyncRequest,
    TransactionIntent, TransactionMode,
};
use crate::common::{BridgeCore, ensure_covers};
use crate::config::{ChainParams, UtxoParams};
use crate::error::BridgeError;
use crate::source::ChainDataSource;
use async_trait::async_trait;
use std::sync::Arc;
use walletsync_cache::CacheConfig;
use walletsync_domain::entities::{Account, Operation};
use walletsync_domain::enums::Family;
use walletsync_domain::value_objects::Amount;

/// Virtual size of a one-input, two-output segwit transaction.
pub const TYPICAL_TX_VBYTES: u64 = 141;

/// Fee of a transaction of `vbytes` at `fee_per_vbyte`.
pub fn estimate_fee(fee_per_vbyte: u64, vbytes: u64) -> Option<Amount> {
    fee_per_vbyte.checked_mul(vbytes).map(Amount::from)
}

pub struct BitcoinBridge {
    core: BridgeCore,
}

impl BitcoinBridge {
    pub fn new(source: Arc<dyn ChainDataSource>, cache_config: CacheConfig) -> Self {
        Self {
            core: BridgeCore::new(Family::Bitcoin, source, cache_config),
        }
    }

    fn params(&self, currency_id: &str) -> Result<&'static UtxoParams, BridgeError> {
        match &self.core.chain(currency_id)?.params {
            ChainParams::Utxo(params) => Ok(params),
            _ => Err(BridgeError::UnknownCurrency(currency_id.to_string())),
        }
    }
}

#[async_trait]
impl AccountBridge for BitcoinBridge {
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
                family: Family::Bitcoin,
                mode: intent.mode,
            });
        }
        if intent.token_id.is_some() {
            return Err(BridgeError::TokensUnsupported(Family::Bitcoin));
        }

        let params = self.params(&account.currency_id)?;
        let dust_limit = Amount::from(params.dust_limit);
        if intent.amount < dust_limit {
            return Err(BridgeError::AmountBelowDust {
                amount: intent.amount,
                dust_limit,
            });
        }

        let fee_per_vbyte = self
            .core
            .fetch_fee_data(&account.currency_id)
            .await?
            .fee_per_vbyte
            .unwrap_or(params.fee_per_vbyte);
        let estimated =
            estimate_fee(fee_per_vbyte, TYPICAL_TX_VBYTES).ok_or(BridgeError::FeeOverflow)?;
        ensure_covers(account.spendable_balance, &[intent.amount, estimated])?;

        Ok(PreparedTransaction {
            account_id: account.id.clone(),
            currency_id: account.currency_id.clone(),
            intent: intent.clone(),
            fee_params: FeeParams::Utxo {
                fee_per_vbyte,
                vbytes: TYPICAL_TX_VBYTES,
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
