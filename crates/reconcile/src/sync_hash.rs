//! Fingerprint of a currency's token list.
//!
//! The hash changes whenever a token is added, removed, or has one of the
//! tracked properties changed. It is a change detector only.

use sha2::{Digest, Sha256};
use walletsync_domain::entities::{CryptoCurrency, TokenCatalog, TokenCurrency};
use walletsync_domain::value_objects::SyncHash;

/// Hashes id, contract address, name, ticker and delisted flag of every token,
/// in list order. Each field is prefixed with its big-endian `u64` byte length
/// so that adjacent fields cannot trade characters.
pub fn compute_sync_hash(tokens: &[TokenCurrency]) -> SyncHash {
    let mut hasher = Sha256::new();
    for token in tokens {
        let delisted = if token.delisted { "true" } else { "false" };
        for field in [
            token.id.as_str(),
            token.contract_address.as_str(),
            token.name.as_str(),
            token.ticker.as_str(),
            delisted,
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
    }
    SyncHash::new(format!("0x{}", hex::encode(hasher.finalize())))
}

/// Sync hash of `currency` given the tokens currently known for it.
pub fn currency_sync_hash(currency: &CryptoCurrency, catalog: &TokenCatalog) -> SyncHash {
    compute_sync_hash(catalog.tokens_for(&currency.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletsync_domain::enums::Family;

    fn tokens() -> Vec<TokenCurrency> {
        vec![
            TokenCurrency::new("ethereum/erc20/usdt", "ethereum", "0xdac17f", "Tether", "USDT", 6),
            TokenCurrency::new("ethereum/erc20/link", "ethereum", "0x514910", "Chainlink", "LINK", 18),
        ]
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(compute_sync_hash(&tokens()), compute_sync_hash(&tokens()));
    }

    #[test]
    fn test_hash_of_empty_list_is_sha256_of_nothing() {
        assert_eq!(
            compute_sync_hash(&[]).as_str(),
            "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_ticker_change_changes_hash() {
        let mut changed = tokens();
        changed[1].ticker = "LNK".to_string();
        assert_ne!(compute_sync_hash(&tokens()), compute_sync_hash(&changed));
    }

    #[test]
    fn test_field_boundaries_change_hash() {
        let mut shifted = tokens();
        shifted[0].name = "TetherU".to_string();
        shifted[0].ticker = "SDT".to_string();
        assert_ne!(compute_sync_hash(&tokens()), compute_sync_hash(&shifted));

        let mut moved = tokens();
        moved[0].id = "ethereum/erc20/usdt0".to_string();
        moved[0].contract_address = "xdac17f".to_string();
        assert_ne!(compute_sync_hash(&tokens()), compute_sync_hash(&moved));
    }

    #[test]
    fn test_delisting_changes_hash() {
        let mut changed = tokens();
        changed[0].delisted = true;
        assert_ne!(compute_sync_hash(&tokens()), compute_sync_hash(&changed));
    }

    #[test]
    fn test_addition_and_removal_change_hash() {
        let base = compute_sync_hash(&tokens());
        assert_ne!(base, compute_sync_hash(&tokens()[..1]));

        let mut added = tokens();
        added.push(TokenCurrency::new("ethereum/erc20/dai", "ethereum", "0x6b1754", "Dai", "DAI", 18));
        assert_ne!(base, compute_sync_hash(&added));
    }

    #[test]
    fn test_currency_hash_reads_catalog() {
        let catalog = TokenCatalog::from_tokens(tokens());
        let ethereum = CryptoCurrency::new("ethereum", Family::Evm, "Ethereum", "ETH", 18);
        let polygon = CryptoCurrency::new("polygon", Family::Evm, "Polygon", "MATIC", 18);

        assert_eq!(currency_sync_hash(&ethereum, &catalog), compute_sync_hash(&tokens()));
        assert_eq!(currency_sync_hash(&polygon, &catalog), compute_sync_hash(&[]));
    }
}
