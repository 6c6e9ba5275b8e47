use async_trait::async_trait;

use crate::errors::error::VcxWalletResult;

#[async_trait]
pub trait AttributeEncoder {
    /// Canonical numeric encoding of a raw credential attribute value. Must be
    /// deterministic: issuance and presentation compare encodings byte for byte.
    async fn derive_encoding(&self, raw: &str) -> VcxWalletResult<String>;
}
