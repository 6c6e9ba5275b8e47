use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::KeyType;
use crate::error::PublicKeyError;

const DID_KEY_PREFIX: &str = "did:key:";

/// Represents raw public key data along with information about the key type
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    key_type: KeyType,
    key: Vec<u8>,
}

impl Key {
    pub fn new(key: Vec<u8>, key_type: KeyType) -> Result<Self, PublicKeyError> {
        if key.len() != key_type.key_len() {
            return Err(PublicKeyError::InvalidKeyLength(
                key.len(),
                key_type.key_len(),
            ));
        }
        Ok(Self { key_type, key })
    }

    pub fn key_type(&self) -> &KeyType {
        &self.key_type
    }

    pub fn validate_key_type(&self, key_type: KeyType) -> Result<&Self, PublicKeyError> {
        if self.key_type() != &key_type {
            return Err(PublicKeyError::InvalidKeyType(
                self.key_type().to_owned(),
                key_type,
            ));
        }
        Ok(self)
    }

    pub fn key(&self) -> &[u8] {
        self.key.as_ref()
    }

    pub fn multicodec_prefixed_key(&self) -> Vec<u8> {
        let code = self.key_type().into();
        let mut buffer = unsigned_varint::encode::u64_buffer();
        let bytes = unsigned_varint::encode::u64(code, &mut buffer);
        let mut prefixed_key = bytes.to_vec();
        prefixed_key.extend_from_slice(&self.key);
        prefixed_key
    }

    pub fn fingerprint(&self) -> String {
        multibase::encode(multibase::Base::Base58Btc, self.multicodec_prefixed_key())
    }

    pub fn did_key(&self) -> String {
        format!("{}{}", DID_KEY_PREFIX, self.fingerprint())
    }

    pub fn base58(&self) -> String {
        bs58::encode(&self.key).into_string()
    }

    pub fn from_fingerprint(fingerprint: &str) -> Result<Self, PublicKeyError> {
        let (_base, decoded_bytes) = multibase::decode(fingerprint)?;
        let (code, remaining_bytes) = unsigned_varint::decode::u64(&decoded_bytes)?;
        Self::new(remaining_bytes.to_vec(), code.try_into()?)
    }

    pub fn from_did_key(did_key: &str) -> Result<Self, PublicKeyError> {
        let fingerprint = did_key
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| PublicKeyError::NotDidKey(did_key.to_owned()))?;
        // did:key may carry a fragment repeating the fingerprint
        let fingerprint = fingerprint.split('#').next().unwrap_or(fingerprint);
        Self::from_fingerprint(fingerprint)
    }

    pub fn from_base58(base58: &str, key_type: KeyType) -> Result<Self, PublicKeyError> {
        let decoded_bytes = bs58::decode(base58).into_vec()?;
        Self::new(decoded_bytes, key_type)
    }

    /// Invitations in the wild carry recipient keys either as raw base58 verkeys or as
    /// `did:key` identifiers; both resolve to an ed25519 key here.
    pub fn from_verkey_or_did_key(value: &str) -> Result<Self, PublicKeyError> {
        let key = if value.starts_with(DID_KEY_PREFIX) {
            Self::from_did_key(value)?
        } else {
            Self::from_base58(value, KeyType::Ed25519)?
        };
        key.validate_key_type(KeyType::Ed25519)?;
        Ok(key)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY_BASE58: &str = "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K";

    #[test]
    fn test_base58_roundtrip_preserves_bytes() {
        let key = Key::from_base58(TEST_KEY_BASE58, KeyType::Ed25519).unwrap();
        assert_eq!(key.key().len(), 32);
        assert_eq!(key.base58(), TEST_KEY_BASE58);
    }

    #[test]
    fn test_did_key_resolves_to_same_key() {
        let key = Key::from_base58(TEST_KEY_BASE58, KeyType::Ed25519).unwrap();
        let did_key = key.did_key();
        assert!(did_key.starts_with("did:key:z6Mk"));

        let parsed = Key::from_verkey_or_did_key(&did_key).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_did_key_with_fragment() {
        let key = Key::from_base58(TEST_KEY_BASE58, KeyType::Ed25519).unwrap();
        let with_fragment = format!("{}#{}", key.did_key(), key.fingerprint());
        assert_eq!(Key::from_did_key(&with_fragment).unwrap(), key);
    }

    #[test]
    fn test_short_key_rejected() {
        let err = Key::from_base58("3yZe7d", KeyType::Ed25519).unwrap_err();
        assert!(matches!(err, PublicKeyError::InvalidKeyLength(_, 32)));
    }

    #[test]
    fn test_non_base58_rejected() {
        assert!(Key::from_base58("0OIl", KeyType::Ed25519).is_err());
    }

    #[test]
    fn test_x25519_did_key_is_not_a_verkey() {
        let key = Key::new(vec![7u8; 32], KeyType::X25519).unwrap();
        let err = Key::from_verkey_or_did_key(&key.did_key()).unwrap_err();
        assert!(matches!(
            err,
            PublicKeyError::InvalidKeyType(KeyType::X25519, KeyType::Ed25519)
        ));
    }
}
