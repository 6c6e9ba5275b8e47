use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{MessageKind, MessageType};
use crate::{
    error::MsgTypeError,
    msg_fields::protocols::{
        basic_message::BasicMessage,
        connection::{invitation::Invitation, request::Request, response::Response},
        cred_issuance::{
            ack::AckCredential, issue_credential::IssueCredential,
            offer_credential::OfferCredential, request_credential::RequestCredential,
        },
        discover_features::{disclose::Disclose, query::Query},
        notification::ack::Ack,
        out_of_band::invitation::OobInvitation,
        present_proof::{
            ack::AckPresentation, presentation::Presentation,
            request::RequestPresentation,
        },
        report_problem::ProblemReport,
        routing::Forward,
        trust_ping::{ping::Ping, ping_response::PingResponse},
    },
    AriesMessage,
};

pub type DecodeFn = fn(Value) -> Result<AriesMessage, serde_json::Error>;

#[derive(Clone, Copy)]
pub struct RegistryEntry {
    pub kind: MessageKind,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("kind", &self.kind)
            .finish()
    }
}

/// `protocol/major/name`, e.g. `connections/1/request`.
type RegistryKey = String;

fn registry_key(protocol: &str, major: u8, name: &str) -> RegistryKey {
    format!("{protocol}/{major}/{name}")
}

fn decode_as<T>(value: Value) -> Result<AriesMessage, serde_json::Error>
where
    T: DeserializeOwned + Into<AriesMessage>,
{
    serde_json::from_value::<T>(value).map(Into::into)
}

fn entry<T>(kind: MessageKind) -> (RegistryKey, RegistryEntry)
where
    T: DeserializeOwned + Into<AriesMessage>,
{
    entry_named::<T>(kind, kind.protocol().name(), kind.name())
}

fn entry_named<T>(
    kind: MessageKind,
    protocol: &'static str,
    name: &'static str,
) -> (RegistryKey, RegistryEntry)
where
    T: DeserializeOwned + Into<AriesMessage>,
{
    let (major, _) = kind.protocol().version();
    (
        registry_key(protocol, major, name),
        RegistryEntry {
            kind,
            decode: decode_as::<T>,
        },
    )
}

lazy_static! {
    /// Lookup table from `(protocol, major version, message name)` to the decoder producing
    /// the matching [`AriesMessage`] variant.
    pub static ref MESSAGE_REGISTRY: HashMap<RegistryKey, RegistryEntry> = {
        HashMap::from([
            entry::<Invitation>(MessageKind::ConnectionInvitation),
            entry::<Request>(MessageKind::ConnectionRequest),
            entry::<Response>(MessageKind::ConnectionResponse),
            entry::<OfferCredential>(MessageKind::CredentialOffer),
            entry::<RequestCredential>(MessageKind::CredentialRequest),
            entry::<IssueCredential>(MessageKind::CredentialIssue),
            entry::<AckCredential>(MessageKind::CredentialAck),
            entry::<RequestPresentation>(MessageKind::PresentationRequest),
            entry::<Presentation>(MessageKind::Presentation),
            entry::<AckPresentation>(MessageKind::PresentationAck),
            entry::<Ack>(MessageKind::Ack),
            entry::<ProblemReport>(MessageKind::ProblemReport),
            entry::<Ping>(MessageKind::Ping),
            entry::<PingResponse>(MessageKind::PingResponse),
            entry::<OobInvitation>(MessageKind::OobInvitation),
            entry::<Forward>(MessageKind::Forward),
            entry::<Query>(MessageKind::FeatureQuery),
            entry::<Disclose>(MessageKind::FeatureDisclose),
            entry::<BasicMessage>(MessageKind::BasicMessage),
            // protocol scoped problem reports collapse into the generic one
            entry_named::<ProblemReport>(MessageKind::ProblemReport, "connections", "problem_report"),
            entry_named::<ProblemReport>(
                MessageKind::ProblemReport,
                "issue-credential",
                "problem-report",
            ),
            entry_named::<ProblemReport>(
                MessageKind::ProblemReport,
                "present-proof",
                "problem-report",
            ),
        ])
    };
}

/// Resolves a parsed `@type`; the minor version is not part of the key.
pub fn resolve(msg_type: &MessageType<'_>) -> Result<&'static RegistryEntry, MsgTypeError> {
    MESSAGE_REGISTRY
        .get(&registry_key(msg_type.protocol, msg_type.major, msg_type.kind))
        .ok_or_else(|| {
            MsgTypeError::unknown_kind(format!(
                "{}/{}.{}/{}",
                msg_type.protocol, msg_type.major, msg_type.minor, msg_type.kind
            ))
        })
}
