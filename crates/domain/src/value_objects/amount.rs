use crate::error::DomainError;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A quantity expressed in the smallest unit of a currency (satoshi, wei, uatom...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub U256);

impl Amount {
    pub fn new(amount: impl Into<U256>) -> Self {
        Self(amount.into())
    }

    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(U256::from(factor)).map(Self)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Self(self.0.saturating_sub(other.0))
    }

    /// Converts to a display value using the currency magnitude.
    ///
    /// Returns `None` when the value does not fit a `Decimal` (magnitude above 28
    /// or more than 96 bits of mantissa).
    pub fn to_decimal(&self, magnitude: u32) -> Option<Decimal> {
        let mut value = Decimal::from_str(&self.0.to_string()).ok()?;
        value.set_scale(magnitude).ok()?;
        Some(value.normalize())
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(U256::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(U256::from(v))
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|_| DomainError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Backends report amounts either as JSON numbers or as decimal strings (wei overflow u64).
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_decimal_uses_magnitude() {
        let amount = Amount::from(150_000_000u64);
        assert_eq!(amount.to_decimal(8), Some(dec!(1.5)));
        assert_eq!(amount.to_decimal(0), Some(dec!(150000000)));
    }

    #[test]
    fn test_to_decimal_rejects_oversized_magnitude() {
        assert_eq!(Amount::from(1u64).to_decimal(40), None);
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Amount = serde_json::from_str("42").unwrap();
        let from_string: Amount = serde_json::from_str("\"1000000000000000000000\"").unwrap();
        assert_eq!(from_number, Amount::from(42u64));
        assert_eq!(from_string, Amount::from(1_000_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_parse_rejects_invalid_amounts() {
        assert_eq!("12345".parse::<Amount>(), Ok(Amount::from(12_345u64)));
        assert_eq!(
            "12a".parse::<Amount>(),
            Err(DomainError::InvalidAmount("12a".to_string()))
        );
        assert!("-1".parse::<Amount>().is_err());
        assert!(format!("1{}", "0".repeat(78)).parse::<Amount>().is_err());
        assert!(serde_json::from_str::<Amount>("\"0x10\"").is_err());
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let small = Amount::from(3u64);
        let big = Amount::from(5u64);
        assert!(small.saturating_sub(big).is_zero());
        assert_eq!(big.saturating_sub(small), Amount::from(2u64));
    }
}
