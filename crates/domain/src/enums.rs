use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A blockchain protocol integration with its own bridge implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Bitcoin,
    Evm,
    Cosmos,
    Cardano,
    Polkadot,
    Solana,
    Ripple,
    Stellar,
    Tezos,
    Tron,
    Algorand,
    Near,
    Hedera,
    Filecoin,
    Elrond,
    Celo,
    CryptoOrg,
    InternetComputer,
}

impl Family {
    pub const ALL: [Family; 18] = [
        Family::Bitcoin,
        Family::Evm,
        Family::Cosmos,
        Family::Cardano,
        Family::Polkadot,
        Family::Solana,
        Family::Ripple,
        Family::Stellar,
        Family::Tezos,
        Family::Tron,
        Family::Algorand,
        Family::Near,
        Family::Hedera,
        Family::Filecoin,
        Family::Elrond,
        Family::Celo,
        Family::CryptoOrg,
        Family::InternetComputer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Bitcoin => "bitcoin",
            Family::Evm => "evm",
            Family::Cosmos => "cosmos",
            Family::Cardano => "cardano",
            Family::Polkadot => "polkadot",
            Family::Solana => "solana",
            Family::Ripple => "ripple",
            Family::Stellar => "stellar",
            Family::Tezos => "tezos",
            Family::Tron => "tron",
            Family::Algorand => "algorand",
            Family::Near => "near",
            Family::Hedera => "hedera",
            Family::Filecoin => "filecoin",
            Family::Elrond => "elrond",
            Family::Celo => "celo",
            Family::CryptoOrg => "crypto_org",
            Family::InternetComputer => "internet_computer",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| DomainError::UnknownFamilyId(s.to_string()))
    }
}

/// Kind of ledger event an operation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    In,
    Out,
    Fees,
    NftIn,
    NftOut,
    Delegate,
    Undelegate,
    Redelegate,
    Reward,
    ContractCall,
    None,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::In => "IN",
            OperationType::Out => "OUT",
            OperationType::Fees => "FEES",
            OperationType::NftIn => "NFT_IN",
            OperationType::NftOut => "NFT_OUT",
            OperationType::Delegate => "DELEGATE",
            OperationType::Undelegate => "UNDELEGATE",
            OperationType::Redelegate => "REDELEGATE",
            OperationType::Reward => "REWARD",
            OperationType::ContractCall => "CONTRACT_CALL",
            OperationType::None => "NONE",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_round_trips_through_id() {
        for family in Family::ALL {
            assert_eq!(family.as_str().parse::<Family>(), Ok(family));
        }
    }

    #[test]
    fn test_unknown_family_id() {
        assert_eq!(
            "dogechain".parse::<Family>(),
            Err(DomainError::UnknownFamilyId("dogechain".to_string()))
        );
    }

    #[test]
    fn test_operation_type_serde_name() {
        let json = serde_json::to_string(&OperationType::NftIn).unwrap();
        assert_eq!(json, "\"NFT_IN\"");
    }
}
