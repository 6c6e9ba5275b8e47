use aries_vcx_ledger::errors::error::VcxLedgerError;

use super::error::{AriesVcxError, AriesVcxErrorKind};

impl From<VcxLedgerError> for AriesVcxError {
    fn from(value: VcxLedgerError) -> Self {
        match value {
            VcxLedgerError::LedgerItemNotFound => {
                Self::from_msg(AriesVcxErrorKind::LedgerItemNotFound, value.to_string())
            }
            VcxLedgerError::InvalidLedgerResponse(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidLedgerResponse, value.to_string())
            }
            VcxLedgerError::IOError(_) => {
                Self::from_msg(AriesVcxErrorKind::IOError, value.to_string())
            }
            VcxLedgerError::InvalidJson(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidLedgerResponse, value.to_string())
            }
            VcxLedgerError::InvalidOption(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidConfiguration, value.to_string())
            }
            VcxLedgerError::InvalidInput(_) => {
                Self::from_msg(AriesVcxErrorKind::InvalidInput, value.to_string())
            }
            VcxLedgerError::UnknownError(_) => {
                Self::from_msg(AriesVcxErrorKind::UnknownError, value.to_string())
            }
        }
    }
}
