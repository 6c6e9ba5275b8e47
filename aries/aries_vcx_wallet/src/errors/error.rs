use std::string::FromUtf8Error;

use thiserror::Error as ThisError;

pub type VcxWalletResult<T> = Result<T, VcxWalletError>;

#[derive(Debug, ThisError)]
pub enum VcxWalletError {
    #[error("Duplicate record error: {0}")]
    DuplicateRecord(String),
    #[error("Unexpected UTF-8 error: {0}")]
    NotUtf8(#[from] FromUtf8Error),
    #[error("String is not base58: {0}")]
    NotBase58(#[from] bs58::decode::Error),
    #[error("Could not find record in wallet: {0}")]
    RecordNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No recipient key found")]
    NoRecipientKeyFound,
    #[error("Message could not be decrypted: {0}")]
    DecryptionFailed(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Public key error: {0}")]
    PublicKeyError(#[from] public_key::PublicKeyError),
    #[error("Unknown error: {0}")]
    Unknown(Box<dyn std::error::Error + Send + Sync>),
}

impl VcxWalletError {
    pub fn unknown_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unknown(Box::new(err))
    }

    pub fn record_not_found(name: &str) -> Self {
        Self::RecordNotFound(name.to_owned())
    }
}
