use aries_vcx_wallet::errors::error::VcxWalletError;

use super::error::{AriesVcxError, AriesVcxErrorKind};

impl From<VcxWalletError> for AriesVcxError {
    fn from(value: VcxWalletError) -> Self {
        match value {
            VcxWalletError::DuplicateRecord(_) => {
                Self::from_msg(AriesVcxErrorKind::WalletError, value.to_string())
            }
            VcxWalletError::RecordNotFound(_) => {
                Self::from_msg(AriesVcxErrorKind::NotFound, value.to_string())
            }
            VcxWalletError::InvalidInput(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidInput, value.to_string())
            }
            VcxWalletError::NoRecipientKeyFound => {
                Self::from_msg(AriesVcxErrorKind::AuthenticationError, value.to_string())
            }
            VcxWalletError::DecryptionFailed(_) => {
                Self::from_msg(AriesVcxErrorKind::AuthenticationError, value.to_string())
            }
            VcxWalletError::InvalidJson(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidJson, value.to_string())
            }
            VcxWalletError::PublicKeyError(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidInput, value.to_string())
            }
            VcxWalletError::NotUtf8(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidMessageFormat, value.to_string())
            }
            VcxWalletError::NotBase58(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidInput, value.to_string())
            }
            VcxWalletError::Unknown(_) => {
                Self::from_msg(AriesVcxErrorKind::WalletError, value.to_string())
            }
        }
    }
}
