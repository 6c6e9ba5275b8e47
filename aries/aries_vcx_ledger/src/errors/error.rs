use thiserror::Error as ThisError;

pub type VcxLedgerResult<T> = Result<T, VcxLedgerError>;

#[derive(Debug, ThisError)]
pub enum VcxLedgerError {
    #[error("Ledger unreachable: {0}")]
    IOError(String),
    #[error("Ledger item not found")]
    LedgerItemNotFound,
    #[error("Invalid ledger response {0}")]
    InvalidLedgerResponse(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl VcxLedgerError {
    /// Failures worth retrying: the ledger could not be reached at all.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IOError(_))
    }
}
