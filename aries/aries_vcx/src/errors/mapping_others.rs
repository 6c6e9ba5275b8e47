use std::sync::PoisonError;

use messages::error::{MessageCodecError, MsgTypeError};
use public_key::PublicKeyError;

use super::error::{AriesVcxError, AriesVcxErrorKind};

impl From<serde_json::Error> for AriesVcxError {
    fn from(err: serde_json::Error) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidJson, format!("Invalid json: {err}"))
    }
}

impl From<MessageCodecError> for AriesVcxError {
    fn from(err: MessageCodecError) -> Self {
        let kind = match &err {
            MessageCodecError::MissingThread(_) => AriesVcxErrorKind::ThreadMismatch,
            MessageCodecError::Json(_) => AriesVcxErrorKind::InvalidJson,
            _ => AriesVcxErrorKind::InvalidMessageFormat,
        };
        AriesVcxError::from_msg(kind, err.to_string())
    }
}

impl From<MsgTypeError> for AriesVcxError {
    fn from(err: MsgTypeError) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidMessageFormat, err.to_string())
    }
}

impl From<anoncreds_types::Error> for AriesVcxError {
    fn from(err: anoncreds_types::Error) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInput, err.to_string())
    }
}

impl From<PublicKeyError> for AriesVcxError {
    fn from(err: PublicKeyError) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInput, err.to_string())
    }
}

impl From<url::ParseError> for AriesVcxError {
    fn from(err: url::ParseError) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInput, err.to_string())
    }
}

impl From<base64::DecodeError> for AriesVcxError {
    fn from(err: base64::DecodeError) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidMessageFormat, err.to_string())
    }
}

impl<T> From<PoisonError<T>> for AriesVcxError {
    fn from(err: PoisonError<T>) -> Self {
        AriesVcxError::from_msg(AriesVcxErrorKind::LockError, err.to_string())
    }
}
