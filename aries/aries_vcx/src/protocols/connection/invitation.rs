use messages::{
    decorators::timing::Timing,
    msg_fields::protocols::{
        connection::{
            invitation::{Invitation, InvitationContent, InvitationDecorators},
            Connection,
        },
        out_of_band::{
            invitation::{OobInvitation, OobService},
            OutOfBand,
        },
    },
    AriesMessage,
};
use public_key::Key;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
use uuid::Uuid;

use super::pairwise_info::PairwiseInfo;
use crate::errors::error::prelude::*;

const ENDPOINT_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

/// Either flavour of invitation a connection can bootstrap from. Serialized with `@type`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyInvitation {
    Con(Invitation),
    Oob(OobInvitation),
}

/// Validated delivery coordinates of a peer: base58 keys and an absolute endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceTarget {
    pub recipient_key: String,
    pub routing_keys: Vec<String>,
    pub service_endpoint: Url,
}

impl AnyInvitation {
    pub fn id(&self) -> &str {
        match self {
            AnyInvitation::Con(invitation) => &invitation.id,
            AnyInvitation::Oob(invitation) => &invitation.id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            AnyInvitation::Con(invitation) => Some(&invitation.content.label),
            AnyInvitation::Oob(invitation) => invitation.content.label.as_deref(),
        }
    }

    /// Validates the first service of the invitation and returns where to send the
    /// connection request.
    pub fn bootstrap_service(&self) -> VcxResult<ServiceTarget> {
        let (recipient_keys, routing_keys, endpoint) = match self {
            AnyInvitation::Con(invitation) => (
                &invitation.content.recipient_keys,
                &invitation.content.routing_keys,
                &invitation.content.service_endpoint,
            ),
            AnyInvitation::Oob(invitation) => match invitation.content.services.first() {
                Some(OobService::Inline(service)) => (
                    &service.recipient_keys,
                    &service.routing_keys,
                    &service.service_endpoint,
                ),
                Some(OobService::Did(did)) => {
                    return Err(AriesVcxError::from_msg(
                        AriesVcxErrorKind::InvalidInvitation,
                        format!("Resolving public DID services is not supported: {did}"),
                    ))
                }
                None => {
                    return Err(AriesVcxError::from_msg(
                        AriesVcxErrorKind::InvalidInvitation,
                        "Out-of-band invitation carries no service",
                    ))
                }
            },
        };
        service_target(recipient_keys, routing_keys, endpoint).map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInvitation,
                format!("Invitation {} is malformed: {}", self.id(), err.msg()),
            )
        })
    }

    pub fn validate(&self) -> VcxResult<()> {
        self.bootstrap_service().map(|_| ())
    }
}

fn normalize_key(key: &str) -> VcxResult<String> {
    Key::from_verkey_or_did_key(key)
        .map(|key| key.base58())
        .map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("Key {key} is not an ed25519 verkey: {err}"),
            )
        })
}

pub fn parse_endpoint(endpoint: &str) -> VcxResult<Url> {
    let url = Url::parse(endpoint)?;
    if !ENDPOINT_SCHEMES.contains(&url.scheme()) || !url.has_host() {
        return Err(AriesVcxError::from_msg(
            AriesVcxErrorKind::InvalidInput,
            format!("Service endpoint {endpoint} is not an absolute http(s) or ws(s) URL"),
        ));
    }
    Ok(url)
}

/// Validates and normalizes raw service data. Errors are `InvalidInput`; callers map them
/// onto the failure kind of their context.
pub fn service_target(
    recipient_keys: &[String],
    routing_keys: &[String],
    endpoint: &str,
) -> VcxResult<ServiceTarget> {
    let service_endpoint = parse_endpoint(endpoint)?;
    let recipient_keys = recipient_keys
        .iter()
        .map(|key| normalize_key(key))
        .collect::<VcxResult<Vec<_>>>()?;
    let recipient_key = recipient_keys.into_iter().next().ok_or_else(|| {
        AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInput, "No recipient keys")
    })?;
    let routing_keys = routing_keys
        .iter()
        .map(|key| normalize_key(key))
        .collect::<VcxResult<Vec<_>>>()?;
    Ok(ServiceTarget {
        recipient_key,
        routing_keys,
        service_endpoint,
    })
}

pub fn build_invitation(
    invitation_key: &PairwiseInfo,
    label: &str,
    service_endpoint: &Url,
    routing_keys: Vec<String>,
) -> Invitation {
    let content = InvitationContent::builder()
        .label(label.to_owned())
        .recipient_keys(vec![invitation_key.pw_vk.clone()])
        .routing_keys(routing_keys)
        .service_endpoint(service_endpoint.to_string())
        .build();
    let decorators = InvitationDecorators::builder().timing(Timing::now()).build();

    Invitation::builder()
        .id(Uuid::new_v4().to_string())
        .content(content)
        .decorators(decorators)
        .build()
}

impl From<AnyInvitation> for AriesMessage {
    fn from(invitation: AnyInvitation) -> Self {
        match invitation {
            AnyInvitation::Con(invitation) => invitation.into(),
            AnyInvitation::Oob(invitation) => invitation.into(),
        }
    }
}

impl TryFrom<AriesMessage> for AnyInvitation {
    type Error = AriesVcxError;

    fn try_from(message: AriesMessage) -> Result<Self, Self::Error> {
        match message {
            AriesMessage::Connection(Connection::Invitation(invitation)) => {
                Ok(AnyInvitation::Con(invitation))
            }
            AriesMessage::OutOfBand(OutOfBand::Invitation(invitation)) => {
                Ok(AnyInvitation::Oob(invitation))
            }
            other => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInvitation,
                format!("Message of kind {} is not an invitation", other.kind()),
            )),
        }
    }
}

impl Serialize for AnyInvitation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AriesMessage::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnyInvitation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let message = AriesMessage::deserialize(deserializer)?;
        AnyInvitation::try_from(message).map_err(|err| D::Error::custom(err.msg().to_owned()))
    }
}

#[cfg(test)]
mod unit_tests {
    use messages::msg_fields::protocols::out_of_band::invitation::{
        InlineService, OobInvitationContent, OobInvitationDecorators,
    };

    use super::*;

    const VERKEY: &str = "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K";

    fn con_invitation(endpoint: &str, keys: Vec<String>) -> AnyInvitation {
        let content = InvitationContent::builder()
            .label("faber".to_owned())
            .recipient_keys(keys)
            .service_endpoint(endpoint.to_owned())
            .build();
        AnyInvitation::Con(
            Invitation::builder()
                .id("invitation-1".to_owned())
                .content(content)
                .decorators(InvitationDecorators::default())
                .build(),
        )
    }

    #[test]
    fn test_valid_invitation_yields_service() {
        let invitation = con_invitation("https://faber.example.org/didcomm", vec![VERKEY.to_owned()]);
        let service = invitation.bootstrap_service().unwrap();
        assert_eq!(service.recipient_key, VERKEY);
        assert_eq!(service.service_endpoint.as_str(), "https://faber.example.org/didcomm");
    }

    #[test]
    fn test_malformed_invitations_are_rejected() {
        for invitation in [
            con_invitation("not a url", vec![VERKEY.to_owned()]),
            con_invitation("ftp://faber.example.org", vec![VERKEY.to_owned()]),
            con_invitation("https://faber.example.org", vec![]),
            con_invitation("https://faber.example.org", vec!["abc".to_owned()]),
        ] {
            let err = invitation.validate().unwrap_err();
            assert_eq!(err.kind(), AriesVcxErrorKind::InvalidInvitation);
            assert_eq!(err.category(), ErrorCategory::Validation);
        }
    }

    #[test]
    fn test_oob_did_key_is_normalized() {
        let did_key = Key::from_verkey_or_did_key(VERKEY).unwrap().did_key();
        let service = InlineService::builder()
            .id("#inline".to_owned())
            .recipient_keys(vec![did_key])
            .service_endpoint("wss://faber.example.org/ws".to_owned())
            .build();
        let invitation = AnyInvitation::Oob(
            OobInvitation::builder()
                .id("oob-1".to_owned())
                .content(
                    OobInvitationContent::builder()
                        .services(vec![OobService::Inline(service)])
                        .build(),
                )
                .decorators(OobInvitationDecorators::default())
                .build(),
        );
        assert_eq!(invitation.bootstrap_service().unwrap().recipient_key, VERKEY);

        let json = serde_json::to_value(&invitation).unwrap();
        assert!(json["@type"].as_str().unwrap().contains("out-of-band"));
        let parsed: AnyInvitation = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, invitation);
    }

    #[test]
    fn test_oob_public_did_service_is_unsupported() {
        let invitation = AnyInvitation::Oob(
            OobInvitation::builder()
                .id("oob-2".to_owned())
                .content(
                    OobInvitationContent::builder()
                        .services(vec![OobService::Did("did:sov:V4SGRU86Z58d6TV7PBUe6f".to_owned())])
                        .build(),
                )
                .decorators(OobInvitationDecorators::default())
                .build(),
        );
        assert_eq!(
            invitation.validate().unwrap_err().kind(),
            AriesVcxErrorKind::InvalidInvitation
        );
    }
}
