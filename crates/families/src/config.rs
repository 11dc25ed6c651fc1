//! Static chain table.
//!
//! Chains of the same family differ only by their parameters, so each chain
//! is a row here rather than a type of its own.

use crate::bridge::TransactionMode;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use walletsync_domain::entities::CryptoCurrency;
use walletsync_domain::enums::Family;

/// Parameters of a Bitcoin-like chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoParams {
    /// Fee rate used when the backend reports none.
    pub fee_per_vbyte: u64,
    /// Smallest output the network relays.
    pub dust_limit: u64,
}

/// Rollup settling on a layer 1 and charging for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer2 {
    /// Optimism-style L1 data fee: `(calldata gas + overhead) * l1 gas price * scalar`.
    Optimism {
        l1_fee_overhead: u64,
        /// Scalar in millionths.
        l1_fee_scalar_ppm: u64,
    },
}

/// Parameters of an EVM chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmParams {
    pub chain_id: u64,
    /// Whether type 2 transactions are supported.
    pub eip1559: bool,
    /// Gas limit of a native transfer.
    pub gas_limit: u64,
    /// Gas limit of an ERC-20 transfer.
    pub token_gas_limit: u64,
    pub layer2: Option<Layer2>,
}

/// Gas needed per Cosmos message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosmosGas {
    pub delegate: u64,
    pub send: u64,
    pub undelegate: u64,
    pub redelegate: u64,
    pub claim_reward: u64,
    pub claim_reward_compound: u64,
}

impl CosmosGas {
    pub fn for_mode(&self, mode: TransactionMode) -> u64 {
        match mode {
            TransactionMode::Send => self.send,
            TransactionMode::Delegate => self.delegate,
            TransactionMode::Undelegate => self.undelegate,
            TransactionMode::Redelegate => self.redelegate,
            TransactionMode::ClaimReward => self.claim_reward,
            TransactionMode::ClaimRewardCompound => self.claim_reward_compound,
        }
    }
}

const DEFAULT_COSMOS_GAS: CosmosGas = CosmosGas {
    delegate: 300_000,
    send: 100_000,
    undelegate: 350_000,
    redelegate: 550_000,
    claim_reward: 300_000,
    claim_reward_compound: 400_000,
};

/// Parameters of a Cosmos SDK chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmosParams {
    pub lcd: &'static str,
    pub default_gas: u64,
    pub gas: CosmosGas,
    /// Minimum gas price in the smallest unit.
    pub min_gas_price: Decimal,
    /// Unbonding period in days.
    pub unbonding_period: u32,
    pub validator_prefix: &'static str,
}

/// Family-specific parameters of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainParams {
    Utxo(UtxoParams),
    Evm(EvmParams),
    Cosmos(CosmosParams),
    /// Supported currency with no parameters used by this crate.
    Generic,
}

/// A row of the chain table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub currency: CryptoCurrency,
    pub params: ChainParams,
}

fn utxo(id: &str, name: &str, ticker: &str, fee_per_vbyte: u64, dust_limit: u64) -> ChainConfig {
    ChainConfig {
        currency: CryptoCurrency::new(id, Family::Bitcoin, name, ticker, 8),
        params: ChainParams::Utxo(UtxoParams {
            fee_per_vbyte,
            dust_limit,
        }),
    }
}

fn evm(id: &str, name: &str, ticker: &str, chain_id: u64, eip1559: bool) -> ChainConfig {
    ChainConfig {
        currency: CryptoCurrency::new(id, Family::Evm, name, ticker, 18),
        params: ChainParams::Evm(EvmParams {
            chain_id,
            eip1559,
            gas_limit: 21_000,
            token_gas_limit: 65_000,
            layer2: None,
        }),
    }
}

fn optimism(id: &str, name: &str, chain_id: u64) -> ChainConfig {
    ChainConfig {
        currency: CryptoCurrency::new(id, Family::Evm, name, "ETH", 18),
        params: ChainParams::Evm(EvmParams {
            chain_id,
            eip1559: true,
            gas_limit: 21_000,
            token_gas_limit: 65_000,
            layer2: Some(Layer2::Optimism {
                l1_fee_overhead: 188,
                l1_fee_scalar_ppm: 684_000,
            }),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn cosmos(
    id: &str,
    name: &str,
    ticker: &str,
    lcd: &'static str,
    gas: CosmosGas,
    min_gas_price: Decimal,
    unbonding_period: u32,
    validator_prefix: &'static str,
) -> ChainConfig {
    ChainConfig {
        currency: CryptoCurrency::new(id, Family::Cosmos, name, ticker, 6),
        params: ChainParams::Cosmos(CosmosParams {
            lcd,
            default_gas: 100_000,
            gas,
            min_gas_price,
            unbonding_period,
            validator_prefix,
        }),
    }
}

fn generic(id: &str, family: Family, name: &str, ticker: &str, magnitude: u32) -> ChainConfig {
    ChainConfig {
        currency: CryptoCurrency::new(id, family, name, ticker, magnitude),
        params: ChainParams::Generic,
    }
}

/// Supported chains, in display order.
pub static CHAINS: Lazy<Vec<ChainConfig>> = Lazy::new(|| {
    vec![
        utxo("bitcoin", "Bitcoin", "BTC", 10, 546),
        utxo("bitcoin_testnet", "Bitcoin Testnet", "tBTC", 1, 546),
        utxo("litecoin", "Litecoin", "LTC", 20, 5_460),
        utxo("dogecoin", "Dogecoin", "DOGE", 1_000, 1_000_000),
        utxo("bitcoin_cash", "Bitcoin Cash", "BCH", 1, 546),
        evm("ethereum", "Ethereum", "ETH", 1, true),
        evm("ethereum_goerli", "Ethereum Goerli", "ETH", 5, true),
        evm("polygon", "Polygon", "MATIC", 137, true),
        evm("bsc", "BNB Chain", "BNB", 56, false),
        evm("avalanche_c_chain", "Avalanche C-Chain", "AVAX", 43_114, true),
        evm("arbitrum", "Arbitrum", "ETH", 42_161, true),
        evm("fantom", "Fantom", "FTM", 250, true),
        evm("cronos", "Cronos", "CRO", 25, true),
        optimism("optimism", "Optimism", 10),
        optimism("optimism_goerli", "Optimism Goerli", 420),
        cosmos(
            "cosmos",
            "Cosmos",
            "ATOM",
            "https://lcd-cosmoshub.blockapsis.com",
            DEFAULT_COSMOS_GAS,
            Decimal::new(25, 3),
            21,
            "cosmosvaloper",
        ),
        cosmos(
            "osmosis",
            "Osmosis",
            "OSMO",
            "https://osmosis-api.polkachu.com",
            DEFAULT_COSMOS_GAS,
            Decimal::new(25, 4),
            14,
            "osmovaloper",
        ),
        cosmos(
            "axelar",
            "Axelar",
            "AXL",
            "https://lcd-axelar.whispernode.com:443",
            CosmosGas {
                delegate: 190_000,
                send: 87_500,
                undelegate: 250_000,
                redelegate: 300_000,
                claim_reward: 300_000,
                claim_reward_compound: 400_000,
            },
            Decimal::new(7, 3),
            21,
            "axelarvaloper",
        ),
        cosmos(
            "onomy",
            "Onomy",
            "NOM",
            "https://rest-mainnet.onomy.io",
            DEFAULT_COSMOS_GAS,
            Decimal::new(3, 0),
            21,
            "onomyvaloper",
        ),
        cosmos(
            "quicksilver",
            "Quicksilver",
            "QCK",
            "https://lcd.quicksilver.zone",
            DEFAULT_COSMOS_GAS,
            Decimal::new(1, 4),
            21,
            "quickvaloper",
        ),
        cosmos(
            "persistence",
            "Persistence",
            "XPRT",
            "https://rest.core.persistence.one",
            DEFAULT_COSMOS_GAS,
            Decimal::new(1, 2),
            21,
            "persistencevaloper",
        ),
        generic("cardano", Family::Cardano, "Cardano", "ADA", 6),
        generic("polkadot", Family::Polkadot, "Polkadot", "DOT", 10),
        generic("solana", Family::Solana, "Solana", "SOL", 9),
        generic("ripple", Family::Ripple, "XRP", "XRP", 6),
        generic("stellar", Family::Stellar, "Stellar", "XLM", 7),
        generic("tezos", Family::Tezos, "Tezos", "XTZ", 6),
        generic("tron", Family::Tron, "Tron", "TRX", 6),
        generic("algorand", Family::Algorand, "Algorand", "ALGO", 6),
        generic("near", Family::Near, "NEAR", "NEAR", 24),
        generic("hedera", Family::Hedera, "Hedera", "HBAR", 8),
        generic("filecoin", Family::Filecoin, "Filecoin", "FIL", 18),
        generic("elrond", Family::Elrond, "MultiversX", "EGLD", 18),
        generic("celo", Family::Celo, "Celo", "CELO", 18),
        generic("crypto_org", Family::CryptoOrg, "Cronos POS Chain", "CRO", 8),
        generic(
            "internet_computer",
            Family::InternetComputer,
            "Internet Computer",
            "ICP",
            8,
        ),
    ]
});

/// Looks up a chain by currency id.
pub fn find_chain(currency_id: &str) -> Option<&'static ChainConfig> {
    CHAINS.iter().find(|chain| chain.currency.id == currency_id)
}

/// Supported currencies, in display order.
pub fn supported_currencies() -> impl Iterator<Item = &'static CryptoCurrency> {
    CHAINS.iter().map(|chain| &chain.currency)
}
