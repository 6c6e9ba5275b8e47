use thiserror::Error;

use crate::msg_types::MessageKind;

/// Failures while parsing an `@type` URI.
#[derive(Debug, Error, PartialEq)]
pub enum MsgTypeError {
    #[error("Unknown message type prefix: {0}")]
    UnknownPrefix(String),
    #[error("Invalid message type format: {0}")]
    InvalidFormat(String),
    #[error("Invalid protocol version: {0}")]
    InvalidVersion(String),
    #[error("Unsupported message type: {0}")]
    UnknownMessageKind(String),
}

impl MsgTypeError {
    pub fn unknown_prefix(prefix: impl Into<String>) -> Self {
        Self::UnknownPrefix(prefix.into())
    }

    pub fn invalid_format(msg_type: impl Into<String>) -> Self {
        Self::InvalidFormat(msg_type.into())
    }

    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownMessageKind(kind.into())
    }
}

#[derive(Debug, Error)]
pub enum MessageCodecError {
    #[error("Message is not a JSON object")]
    NotAnObject,
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),
    #[error("Message of kind {0} must carry `~thread.thid`")]
    MissingThread(MessageKind),
    #[error(transparent)]
    MsgType(#[from] MsgTypeError),
    #[error("Malformed {kind} message: {source}")]
    Malformed {
        kind: MessageKind,
        source: serde_json::Error,
    },
    #[error("Invalid DID document: {0}")]
    InvalidDidDoc(String),
    #[error("Invalid attachment: {0}")]
    Attachment(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type MessageCodecResult<T> = Result<T, MessageCodecError>;
