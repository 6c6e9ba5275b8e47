use anoncreds_types::{Error as AnoncredsTypesError, ErrorKind};

use super::error::VcxLedgerError;

impl From<AnoncredsTypesError> for VcxLedgerError {
    fn from(err: AnoncredsTypesError) -> Self {
        match err.kind() {
            ErrorKind::Conversion => VcxLedgerError::InvalidLedgerResponse(err.to_string()),
            ErrorKind::Validation => VcxLedgerError::InvalidInput(err.to_string()),
        }
    }
}
