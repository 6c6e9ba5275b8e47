use aries_vcx_wallet::wallet::base_wallet::BaseWallet;

use crate::errors::error::prelude::*;

/// Canonical encoding of a raw attribute value, delegated to the wallet so that issuance
/// and presentation use the exact same mapping.
pub async fn encode_attribute(wallet: &dyn BaseWallet, raw: &str) -> VcxResult<String> {
    Ok(wallet.derive_encoding(raw).await?)
}

pub async fn encoding_matches(wallet: &dyn BaseWallet, raw: &str, encoded: &str) -> VcxResult<bool> {
    let expected = encode_attribute(wallet, raw).await?;
    if expected != encoded {
        debug!("Encoding of {raw:?} mismatch, expected {expected}, got {encoded}");
    }
    Ok(expected == encoded)
}

/// Integer view of an attribute for predicate evaluation.
pub fn numeric_value(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod unit_tests {
    use test_utils::dev_wallet::DevWallet;

    use super::*;

    #[tokio::test]
    async fn test_encoding_is_reproducible() {
        let wallet = DevWallet::new();
        let encoded = encode_attribute(&wallet, "Alice").await.unwrap();
        assert!(encoding_matches(&wallet, "Alice", &encoded).await.unwrap());
        assert!(!encoding_matches(&wallet, "Bob", &encoded).await.unwrap());
        assert_eq!(encode_attribute(&wallet, "30").await.unwrap(), "30");
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("30"), Some(30));
        assert_eq!(numeric_value(" -4 "), Some(-4));
        assert_eq!(numeric_value("thirty"), None);
    }
}
