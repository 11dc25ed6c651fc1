use crate::enums::Family;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A native coin of a blockchain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CryptoCurrency {
    pub id: String,
    pub family: Family,
    pub name: String,
    pub ticker: String,
    /// Number of decimals between the smallest unit and the display unit.
    pub magnitude: u32,
}

impl CryptoCurrency {
    pub fn new(
        id: impl Into<String>,
        family: Family,
        name: impl Into<String>,
        ticker: impl Into<String>,
        magnitude: u32,
    ) -> Self {
        Self {
            id: id.into(),
            family,
            name: name.into(),
            ticker: ticker.into(),
            magnitude,
        }
    }
}

/// A token issued on top of a parent currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenCurrency {
    pub id: String,
    pub parent_currency: String,
    pub contract_address: String,
    pub name: String,
    pub ticker: String,
    pub magnitude: u32,
    #[serde(default)]
    pub delisted: bool,
}

impl TokenCurrency {
    pub fn new(
        id: impl Into<String>,
        parent_currency: impl Into<String>,
        contract_address: impl Into<String>,
        name: impl Into<String>,
        ticker: impl Into<String>,
        magnitude: u32,
    ) -> Self {
        Self {
            id: id.into(),
            parent_currency: parent_currency.into(),
            contract_address: contract_address.into(),
            name: name.into(),
            ticker: ticker.into(),
            magnitude,
            delisted: false,
        }
    }
}

/// Known tokens grouped by parent currency, in list order.
#[derive(Debug, Clone, Default)]
pub struct TokenCatalog {
    by_currency: HashMap<String, Vec<TokenCurrency>>,
}

impl TokenCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog, keeping the order tokens are given in.
    pub fn from_tokens(tokens: impl IntoIterator<Item = TokenCurrency>) -> Self {
        let mut catalog = Self::new();
        for token in tokens {
            catalog.add(token);
        }
        catalog
    }

    /// Adds a token, replacing a previous one with the same id in place.
    pub fn add(&mut self, token: TokenCurrency) {
        let list = self
            .by_currency
            .entry(token.parent_currency.clone())
            .or_default();
        match list.iter_mut().find(|t| t.id == token.id) {
            Some(existing) => *existing = token,
            None => list.push(token),
        }
    }

    pub fn tokens_for(&self, currency_id: &str) -> &[TokenCurrency] {
        self.by_currency
            .get(currency_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, token_id: &str) -> Option<&TokenCurrency> {
        self.by_currency
            .values()
            .flat_map(|tokens| tokens.iter())
            .find(|t| t.id == token_id)
    }

    pub fn len(&self) -> usize {
        self.by_currency.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
