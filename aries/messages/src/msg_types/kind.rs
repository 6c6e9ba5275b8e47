use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use super::DIDCOMM_PREFIX;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum Protocol {
    Connections,
    IssueCredential,
    PresentProof,
    Notification,
    ReportProblem,
    TrustPing,
    OutOfBand,
    Routing,
    DiscoverFeatures,
    BasicMessage,
}

impl Protocol {
    /// Version emitted on encode. Any minor of the same major is accepted on decode.
    pub const fn version(&self) -> (u8, u8) {
        match self {
            Self::OutOfBand => (1, 1),
            _ => (1, 0),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connections => "connections",
            Self::IssueCredential => "issue-credential",
            Self::PresentProof => "present-proof",
            Self::Notification => "notification",
            Self::ReportProblem => "report-problem",
            Self::TrustPing => "trust_ping",
            Self::OutOfBand => "out-of-band",
            Self::Routing => "routing",
            Self::DiscoverFeatures => "discover-features",
            Self::BasicMessage => "basicmessage",
        }
    }

    /// Versioned protocol URI as disclosed to peers, e.g. `https://didcomm.org/routing/1.0`.
    pub fn pid(&self) -> String {
        let (major, minor) = self.version();
        format!("{DIDCOMM_PREFIX}{}/{major}.{minor}", self.name())
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat enumeration of every message the agent understands.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum MessageKind {
    ConnectionInvitation,
    ConnectionRequest,
    ConnectionResponse,
    CredentialOffer,
    CredentialRequest,
    CredentialIssue,
    CredentialAck,
    PresentationRequest,
    Presentation,
    PresentationAck,
    Ack,
    ProblemReport,
    Ping,
    PingResponse,
    OobInvitation,
    Forward,
    FeatureQuery,
    FeatureDisclose,
    BasicMessage,
}

impl MessageKind {
    pub const fn protocol(&self) -> Protocol {
        match self {
            Self::ConnectionInvitation | Self::ConnectionRequest | Self::ConnectionResponse => {
                Protocol::Connections
            }
            Self::CredentialOffer
            | Self::CredentialRequest
            | Self::CredentialIssue
            | Self::CredentialAck => Protocol::IssueCredential,
            Self::PresentationRequest | Self::Presentation | Self::PresentationAck => {
                Protocol::PresentProof
            }
            Self::Ack => Protocol::Notification,
            Self::ProblemReport => Protocol::ReportProblem,
            Self::Ping | Self::PingResponse => Protocol::TrustPing,
            Self::OobInvitation => Protocol::OutOfBand,
            Self::Forward => Protocol::Routing,
            Self::FeatureQuery | Self::FeatureDisclose => Protocol::DiscoverFeatures,
            Self::BasicMessage => Protocol::BasicMessage,
        }
    }

    /// Message name as it appears in the last segment of `@type`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionInvitation | Self::OobInvitation => "invitation",
            Self::ConnectionRequest => "request",
            Self::ConnectionResponse => "response",
            Self::CredentialOffer => "offer-credential",
            Self::CredentialRequest => "request-credential",
            Self::CredentialIssue => "issue-credential",
            Self::CredentialAck | Self::PresentationAck | Self::Ack => "ack",
            Self::PresentationRequest => "request-presentation",
            Self::Presentation => "presentation",
            Self::ProblemReport => "problem-report",
            Self::Ping => "ping",
            Self::PingResponse => "ping_response",
            Self::Forward => "forward",
            Self::FeatureQuery => "query",
            Self::FeatureDisclose => "disclose",
            Self::BasicMessage => "message",
        }
    }

    pub fn type_uri(&self) -> String {
        let protocol = self.protocol();
        let (major, minor) = protocol.version();
        format!(
            "{DIDCOMM_PREFIX}{}/{major}.{minor}/{}",
            protocol.name(),
            self.name()
        )
    }

    /// Initiating messages open a thread; without a `~thread` decorator their `@id` is the
    /// thread id. Every other message must reference an existing thread.
    pub const fn is_initiating(&self) -> bool {
        matches!(
            self,
            Self::ConnectionInvitation
                | Self::ConnectionRequest
                | Self::CredentialOffer
                | Self::PresentationRequest
                | Self::Ping
                | Self::OobInvitation
                | Self::Forward
                | Self::FeatureQuery
                | Self::BasicMessage
        )
    }

    pub const fn is_ack(&self) -> bool {
        matches!(self, Self::CredentialAck | Self::PresentationAck | Self::Ack)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_type_uris() {
        assert_eq!(
            MessageKind::ConnectionRequest.type_uri(),
            "https://didcomm.org/connections/1.0/request"
        );
        assert_eq!(
            MessageKind::PingResponse.type_uri(),
            "https://didcomm.org/trust_ping/1.0/ping_response"
        );
        assert_eq!(
            MessageKind::OobInvitation.type_uri(),
            "https://didcomm.org/out-of-band/1.1/invitation"
        );
        assert_eq!(
            MessageKind::ProblemReport.type_uri(),
            "https://didcomm.org/report-problem/1.0/problem-report"
        );
        assert_eq!(
            MessageKind::FeatureDisclose.type_uri(),
            "https://didcomm.org/discover-features/1.0/disclose"
        );
        assert_eq!(
            MessageKind::BasicMessage.type_uri(),
            "https://didcomm.org/basicmessage/1.0/message"
        );
    }

    #[test]
    fn test_protocol_ids() {
        assert_eq!(Protocol::TrustPing.pid(), "https://didcomm.org/trust_ping/1.0");
        assert_eq!(Protocol::OutOfBand.pid(), "https://didcomm.org/out-of-band/1.1");
        for kind in MessageKind::iter() {
            assert!(kind.type_uri().starts_with(&kind.protocol().pid()));
        }
    }

    #[test]
    fn test_type_uris_are_unique() {
        let mut uris: Vec<String> = MessageKind::iter().map(|k| k.type_uri()).collect();
        let total = uris.len();
        uris.sort();
        uris.dedup();
        assert_eq!(uris.len(), total);
    }

    #[test]
    fn test_acks_are_not_initiating() {
        for kind in MessageKind::iter().filter(MessageKind::is_ack) {
            assert!(!kind.is_initiating());
        }
    }
}
