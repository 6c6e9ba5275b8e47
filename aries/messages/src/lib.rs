#![allow(clippy::or_fun_call)]
#![allow(clippy::module_inception)]
#![allow(clippy::derive_partial_eq_without_eq)]
#![allow(clippy::large_enum_variant)]

pub mod decorators;
pub mod error;
pub mod misc;
pub mod msg_fields;
pub mod msg_parts;
pub mod msg_types;

use std::fmt;

use derive_more::From;
use msg_fields::protocols::{
    basic_message::BasicMessage, connection::Connection, cred_issuance::CredentialIssuance,
    discover_features::DiscoverFeatures, notification::Notification, out_of_band::OutOfBand,
    present_proof::PresentProof, report_problem::ProblemReport, routing::Forward,
    trust_ping::TrustPing,
};
use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
    decorators::thread::Thread,
    error::{MessageCodecError, MessageCodecResult},
    msg_types::{registry, MessageKind, MessageType},
};

/// Enum that can represent any message of the implemented protocols.
///
/// It abstracts away the `@type` field and uses it to determine how
/// to deserialize the input into the correct message type.
///
/// It also automatically appends the correct `@type` field when serializing
/// a message.
#[derive(Clone, Debug, From, PartialEq)]
pub enum AriesMessage {
    Routing(Forward),
    Connection(Connection),
    CredentialIssuance(CredentialIssuance),
    PresentProof(PresentProof),
    Notification(Notification),
    ReportProblem(ProblemReport),
    TrustPing(TrustPing),
    OutOfBand(OutOfBand),
    DiscoverFeatures(DiscoverFeatures),
    BasicMessage(BasicMessage),
}

macro_rules! dispatch {
    ($msg:expr, $m:ident => $body:expr) => {
        match $msg {
            AriesMessage::Routing($m) => $body,
            AriesMessage::Connection(Connection::Invitation($m)) => $body,
            AriesMessage::Connection(Connection::Request($m)) => $body,
            AriesMessage::Connection(Connection::Response($m)) => $body,
            AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential($m)) => $body,
            AriesMessage::CredentialIssuance(CredentialIssuance::RequestCredential($m)) => $body,
            AriesMessage::CredentialIssuance(CredentialIssuance::IssueCredential($m)) => $body,
            AriesMessage::CredentialIssuance(CredentialIssuance::Ack($m)) => $body,
            AriesMessage::PresentProof(PresentProof::RequestPresentation($m)) => $body,
            AriesMessage::PresentProof(PresentProof::Presentation($m)) => $body,
            AriesMessage::PresentProof(PresentProof::Ack($m)) => $body,
            AriesMessage::Notification(Notification::Ack($m)) => $body,
            AriesMessage::ReportProblem($m) => $body,
            AriesMessage::TrustPing(TrustPing::Ping($m)) => $body,
            AriesMessage::TrustPing(TrustPing::PingResponse($m)) => $body,
            AriesMessage::OutOfBand(OutOfBand::Invitation($m)) => $body,
            AriesMessage::DiscoverFeatures(DiscoverFeatures::Query($m)) => $body,
            AriesMessage::DiscoverFeatures(DiscoverFeatures::Disclose($m)) => $body,
            AriesMessage::BasicMessage($m) => $body,
        }
    };
}

impl AriesMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Routing(_) => MessageKind::Forward,
            Self::Connection(Connection::Invitation(_)) => MessageKind::ConnectionInvitation,
            Self::Connection(Connection::Request(_)) => MessageKind::ConnectionRequest,
            Self::Connection(Connection::Response(_)) => MessageKind::ConnectionResponse,
            Self::CredentialIssuance(CredentialIssuance::OfferCredential(_)) => {
                MessageKind::CredentialOffer
            }
            Self::CredentialIssuance(CredentialIssuance::RequestCredential(_)) => {
                MessageKind::CredentialRequest
            }
            Self::CredentialIssuance(CredentialIssuance::IssueCredential(_)) => {
                MessageKind::CredentialIssue
            }
            Self::CredentialIssuance(CredentialIssuance::Ack(_)) => MessageKind::CredentialAck,
            Self::PresentProof(PresentProof::RequestPresentation(_)) => {
                MessageKind::PresentationRequest
            }
            Self::PresentProof(PresentProof::Presentation(_)) => MessageKind::Presentation,
            Self::PresentProof(PresentProof::Ack(_)) => MessageKind::PresentationAck,
            Self::Notification(Notification::Ack(_)) => MessageKind::Ack,
            Self::ReportProblem(_) => MessageKind::ProblemReport,
            Self::TrustPing(TrustPing::Ping(_)) => MessageKind::Ping,
            Self::TrustPing(TrustPing::PingResponse(_)) => MessageKind::PingResponse,
            Self::OutOfBand(OutOfBand::Invitation(_)) => MessageKind::OobInvitation,
            Self::DiscoverFeatures(DiscoverFeatures::Query(_)) => MessageKind::FeatureQuery,
            Self::DiscoverFeatures(DiscoverFeatures::Disclose(_)) => MessageKind::FeatureDisclose,
            Self::BasicMessage(_) => MessageKind::BasicMessage,
        }
    }

    pub fn id(&self) -> &str {
        dispatch!(self, m => m.id.as_str())
    }

    pub fn thread(&self) -> Option<&Thread> {
        match self {
            Self::Routing(_) | Self::Connection(Connection::Invitation(_)) => None,
            Self::OutOfBand(OutOfBand::Invitation(_)) => None,
            Self::DiscoverFeatures(DiscoverFeatures::Query(_)) => None,
            Self::Connection(Connection::Request(m)) => m.decorators.thread.as_ref(),
            Self::Connection(Connection::Response(m)) => Some(&m.decorators.thread),
            Self::CredentialIssuance(CredentialIssuance::OfferCredential(m)) => {
                m.decorators.thread.as_ref()
            }
            Self::CredentialIssuance(CredentialIssuance::RequestCredential(m)) => {
                Some(&m.decorators.thread)
            }
            Self::CredentialIssuance(CredentialIssuance::IssueCredential(m)) => {
                Some(&m.decorators.thread)
            }
            Self::CredentialIssuance(CredentialIssuance::Ack(m)) => Some(&m.decorators.thread),
            Self::PresentProof(PresentProof::RequestPresentation(m)) => {
                m.decorators.thread.as_ref()
            }
            Self::PresentProof(PresentProof::Presentation(m)) => Some(&m.decorators.thread),
            Self::PresentProof(PresentProof::Ack(m)) => Some(&m.decorators.thread),
            Self::Notification(Notification::Ack(m)) => Some(&m.decorators.thread),
            Self::ReportProblem(m) => Some(&m.decorators.thread),
            Self::TrustPing(TrustPing::Ping(m)) => m.decorators.thread.as_ref(),
            Self::TrustPing(TrustPing::PingResponse(m)) => Some(&m.decorators.thread),
            Self::DiscoverFeatures(DiscoverFeatures::Disclose(m)) => Some(&m.decorators.thread),
            Self::BasicMessage(m) => m.decorators.thread.as_ref(),
        }
    }

    /// `~thread.thid`, falling back to `@id` for messages opening a thread.
    pub fn thread_id(&self) -> &str {
        self.thread()
            .map(|thread| thread.thid.as_str())
            .unwrap_or_else(|| self.id())
    }

    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread().and_then(|thread| thread.pthid.as_deref())
    }

    pub fn to_json(&self) -> MessageCodecResult<Value> {
        let mut value = dispatch!(self, m => serde_json::to_value(m))?;
        if let Value::Object(map) = &mut value {
            map.insert("@type".to_owned(), Value::String(self.kind().type_uri()));
        }
        Ok(value)
    }

    pub fn to_vec(&self) -> MessageCodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// Decodes a wire message: resolves `@type` through the registry, enforces the
    /// threading rules and deserializes into the matching variant.
    pub fn from_json(mut value: Value) -> MessageCodecResult<Self> {
        let map = value.as_object_mut().ok_or(MessageCodecError::NotAnObject)?;

        let msg_type = match map.remove("@type") {
            Some(Value::String(msg_type)) => msg_type,
            _ => return Err(MessageCodecError::MissingField("@type")),
        };
        if !matches!(map.get("@id"), Some(Value::String(id)) if !id.is_empty()) {
            return Err(MessageCodecError::MissingField("@id"));
        }

        let entry = registry::resolve(&MessageType::try_from(msg_type.as_str())?)?;

        let has_thid = map
            .get("~thread")
            .and_then(|thread| thread.get("thid"))
            .and_then(Value::as_str)
            .is_some_and(|thid| !thid.is_empty());
        if !entry.kind.is_initiating() && !has_thid {
            return Err(MessageCodecError::MissingThread(entry.kind));
        }

        (entry.decode)(value).map_err(|source| MessageCodecError::Malformed {
            kind: entry.kind,
            source,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> MessageCodecResult<Self> {
        Self::from_json(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Display for AriesMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(value) => write!(f, "{value}"),
            Err(_) => write!(f, "{} {}", self.kind(), self.id()),
        }
    }
}

impl<'de> Deserialize<'de> for AriesMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(D::Error::custom)
    }
}

impl Serialize for AriesMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}
