use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::PublicKeyError;

/// Key types the agent handles. Pairwise and invitation keys are always ed25519;
/// x25519 shows up only as the key agreement form of those keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    X25519,
}

impl KeyType {
    const C_X25519: u64 = 236;
    const C_ED25519: u64 = 237;

    /// Raw public key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            KeyType::Ed25519 | KeyType::X25519 => 32,
        }
    }
}

// https://github.com/multiformats/multicodec/blob/master/table.csv
impl From<&KeyType> for u64 {
    fn from(key_type: &KeyType) -> Self {
        match key_type {
            KeyType::X25519 => KeyType::C_X25519,
            KeyType::Ed25519 => KeyType::C_ED25519,
        }
    }
}

impl TryFrom<u64> for KeyType {
    type Error = PublicKeyError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            KeyType::C_X25519 => Ok(KeyType::X25519),
            KeyType::C_ED25519 => Ok(KeyType::Ed25519),
            p => Err(PublicKeyError::UnsupportedMulticodecDescriptor(p)),
        }
    }
}

impl Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::X25519 => write!(f, "X25519"),
            KeyType::Ed25519 => write!(f, "Ed25519"),
        }
    }
}
