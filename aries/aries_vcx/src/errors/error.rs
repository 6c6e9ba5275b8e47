use std::{error::Error, fmt};

use thiserror;

pub mod prelude {
    pub use super::{err_msg, AriesVcxError, AriesVcxErrorKind, ErrorCategory, VcxResult};
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error, Serialize, Deserialize)]
pub enum AriesVcxErrorKind {
    // Common
    #[error("Object is in invalid state for requested operation")]
    InvalidState,
    #[error("Invalid Configuration")]
    InvalidConfiguration,
    #[error("Authentication error")]
    AuthenticationError,
    #[error("Invalid JSON string")]
    InvalidJson,
    #[error("IO Error")]
    IOError,
    #[error("Invalid input parameter")]
    InvalidInput,
    #[error("Object not found")]
    NotFound,
    #[error("Lock could not be acquired")]
    LockError,

    // Connection
    #[error("Invitation is malformed")]
    InvalidInvitation,
    #[error("Key agreement with the peer failed")]
    KeyAgreementFailed,

    // Threading
    #[error("Operation is not allowed in the current state of the thread")]
    WrongState,
    #[error("Message does not belong to any known thread")]
    ThreadMismatch,
    #[error("Message kind is not valid for the current state")]
    UnexpectedMessage,
    #[error("A reply of this kind is already expected on the thread")]
    DuplicatePendingExchange,
    #[error("No reply arrived within the retry budget")]
    ExchangeTimedOut,

    // Issuance
    #[error("No credential offer is active on the thread")]
    NoActiveOffer,
    #[error("Attributes do not match the schema")]
    SchemaMismatch,
    #[error("Revocation registry could not be resolved")]
    RevocationRegistryUnavailable,

    // Proof
    #[error("No stored credential satisfies the request")]
    NoMatchingCredential,

    // Ledger
    #[error("Ledger rejected submitted request.")]
    InvalidLedgerResponse,
    #[error("Ledger item not found.")]
    LedgerItemNotFound,

    // Transport
    #[error("Message failed in post")]
    PostMessageFailed,

    // Wallet
    #[error("Unexpected wallet error")]
    WalletError,

    #[error("Invalid message format")]
    InvalidMessageFormat,
    #[error("Unknown Error")]
    UnknownError,
}

/// Failure classes deciding what a failed transition does to its thread.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed input. Reported to the caller, thread unaffected.
    Validation,
    /// Message or operation inapplicable to the current state. Dropped, thread unaffected.
    State,
    /// Signature, decryption or key agreement failure. Thread abandoned.
    Crypto,
    /// Retry budget exhausted. Thread abandoned.
    Timeout,
    /// Ledger or registry unreachable after retries. Thread abandoned.
    ExternalService,
}

impl ErrorCategory {
    pub fn abandons_thread(&self) -> bool {
        matches!(self, Self::Crypto | Self::Timeout | Self::ExternalService)
    }
}

impl AriesVcxErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInvitation
            | Self::InvalidJson
            | Self::InvalidMessageFormat
            | Self::InvalidInput
            | Self::InvalidConfiguration
            | Self::SchemaMismatch
            | Self::NoMatchingCredential
            | Self::NotFound => ErrorCategory::Validation,
            Self::WrongState
            | Self::InvalidState
            | Self::ThreadMismatch
            | Self::UnexpectedMessage
            | Self::NoActiveOffer
            | Self::DuplicatePendingExchange
            | Self::LockError => ErrorCategory::State,
            Self::KeyAgreementFailed | Self::AuthenticationError | Self::WalletError => {
                ErrorCategory::Crypto
            }
            Self::ExchangeTimedOut => ErrorCategory::Timeout,
            Self::RevocationRegistryUnavailable
            | Self::LedgerItemNotFound
            | Self::InvalidLedgerResponse
            | Self::IOError
            | Self::PostMessageFailed
            | Self::UnknownError => ErrorCategory::ExternalService,
        }
    }
}

#[derive(thiserror::Error, Clone)]
pub struct AriesVcxError {
    msg: String,
    kind: AriesVcxErrorKind,
    backtrace: Option<String>,
}

fn format_error(err: &AriesVcxError, f: &mut fmt::Formatter) -> fmt::Result {
    writeln!(f, "Error: {}", err.msg())?;
    match err.backtrace() {
        None => {}
        Some(backtrace) => {
            writeln!(f, "Backtrace: {}", backtrace)?;
        }
    }
    let mut current = err.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

impl fmt::Display for AriesVcxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        format_error(self, f)
    }
}

impl fmt::Debug for AriesVcxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        format_error(self, f)
    }
}

fn try_capture_backtrace() -> Option<String> {
    #[cfg(feature = "backtrace_errors")]
    {
        use backtrace::Backtrace;

        let backtrace = Backtrace::new();
        let mut filtered_backtrace = String::new();

        for frame in backtrace.frames() {
            if let Some(symbol) = frame.symbols().first() {
                if let (Some(filename), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    filtered_backtrace.push_str(&format!("[{}:{}]", filename.display(), line));
                }
                if let Some(name) = symbol.name() {
                    filtered_backtrace.push_str(&format!(" {}", name));
                }
                filtered_backtrace.push('\n');
            }
        }
        Some(filtered_backtrace)
    }
    #[cfg(not(feature = "backtrace_errors"))]
    None
}

impl AriesVcxError {
    fn new(kind: AriesVcxErrorKind, msg: String) -> Self {
        AriesVcxError {
            msg,
            kind,
            backtrace: try_capture_backtrace(),
        }
    }

    pub fn from_msg<D>(kind: AriesVcxErrorKind, msg: D) -> AriesVcxError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(kind, msg.to_string())
    }

    pub fn find_root_cause(&self) -> String {
        let mut current = self.source();
        while let Some(cause) = current {
            if cause.source().is_none() {
                return cause.to_string();
            }
            current = cause.source();
        }
        self.to_string()
    }

    pub fn kind(&self) -> AriesVcxErrorKind {
        self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn backtrace(&self) -> Option<&String> {
        self.backtrace.as_ref()
    }

    pub fn extend<D>(self, msg: D) -> AriesVcxError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(self.kind, format!("{}\n{}", self.msg, msg))
    }

    pub fn map<D>(self, kind: AriesVcxErrorKind, msg: D) -> AriesVcxError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(kind, msg.to_string())
    }
}

pub fn err_msg<D>(kind: AriesVcxErrorKind, msg: D) -> AriesVcxError
where
    D: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    AriesVcxError::from_msg(kind, msg)
}

pub type VcxResult<T> = Result<T, AriesVcxError>;
