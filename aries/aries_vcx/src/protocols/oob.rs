use base64::{engine::general_purpose, Engine};
use messages::{
    decorators::{attachment::Attachment, timing::Timing},
    msg_fields::protocols::{
        cred_issuance::CredentialIssuance,
        out_of_band::{
            invitation::{
                InlineService, OobInvitation, OobInvitationContent, OobInvitationDecorators,
                OobService,
            },
            OutOfBand, HANDSHAKE_CONNECTIONS_V1,
        },
        present_proof::PresentProof,
    },
    AriesMessage,
};
use url::Url;
use uuid::Uuid;

use super::connection::{invitation::AnyInvitation, pairwise_info::PairwiseInfo};
use crate::{errors::error::prelude::*, handlers::util::AttachmentId};

const OOB_QUERY_PARAM: &str = "oob";

/// Builder for an out-of-band invitation. The invitation `@id` becomes the thread id of
/// the connection it bootstraps.
#[derive(Debug, PartialEq, Clone)]
pub struct OutOfBandSender {
    pub oob: OobInvitation,
}

impl OutOfBandSender {
    pub fn create() -> Self {
        let content = OobInvitationContent::builder().services(Vec::new()).build();
        let decorators = OobInvitationDecorators::builder().timing(Timing::now()).build();
        Self {
            oob: OobInvitation::builder()
                .id(Uuid::new_v4().to_string())
                .content(content)
                .decorators(decorators)
                .build(),
        }
    }

    pub fn set_label(mut self, label: &str) -> Self {
        self.oob.content.label = Some(label.to_string());
        self
    }

    /// Inline service addressed to `pairwise_info`'s key.
    pub fn append_service(
        mut self,
        pairwise_info: &PairwiseInfo,
        endpoint: &Url,
        routing_keys: Vec<String>,
    ) -> Self {
        let service = InlineService::builder()
            .id(format!("{}#inline", self.oob.id))
            .recipient_keys(vec![pairwise_info.pw_vk.clone()])
            .routing_keys(routing_keys)
            .service_endpoint(endpoint.to_string())
            .build();
        self.oob.content.services.push(OobService::Inline(service));
        self
    }

    pub fn append_handshake_protocol(mut self, protocol: &str) -> VcxResult<Self> {
        if protocol != HANDSHAKE_CONNECTIONS_V1 {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("Handshake protocol {protocol} is not supported"),
            ));
        }
        self.oob
            .content
            .handshake_protocols
            .get_or_insert_with(Vec::new)
            .push(protocol.to_owned());
        Ok(self)
    }

    /// Attaches a credential offer or a presentation request.
    pub fn append_a2a_message(mut self, msg: AriesMessage) -> VcxResult<Self> {
        let attach_id = match &msg {
            AriesMessage::PresentProof(PresentProof::RequestPresentation(_)) => {
                AttachmentId::PresentationRequest
            }
            AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential(_)) => {
                AttachmentId::CredentialOffer
            }
            _ => {
                error!("Appended message type {} is not allowed.", msg.kind());
                return Err(AriesVcxError::from_msg(
                    AriesVcxErrorKind::InvalidMessageFormat,
                    format!("Appended message type {} is not allowed.", msg.kind()),
                ));
            }
        };
        let attachment = Attachment::from_payload(attach_id.as_ref(), &msg)?;
        self.oob
            .content
            .requests_attach
            .get_or_insert_with(Vec::new)
            .push(attachment);
        Ok(self)
    }

    pub fn get_id(&self) -> &str {
        &self.oob.id
    }

    pub fn invitation_to_aries_message(&self) -> AriesMessage {
        self.oob.clone().into()
    }

    pub fn invitation_to_url(&self, domain_path: &str) -> VcxResult<Url> {
        let encoded =
            general_purpose::URL_SAFE_NO_PAD.encode(self.invitation_to_aries_message().to_vec()?);
        let mut url = Url::parse(domain_path)?;
        url.query_pairs_mut().append_pair(OOB_QUERY_PARAM, &encoded);
        Ok(url)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OutOfBandReceiver {
    pub oob: OobInvitation,
}

impl OutOfBandReceiver {
    pub fn create_from_a2a_msg(msg: &AriesMessage) -> VcxResult<Self> {
        trace!("OutOfBandReceiver::create_from_a2a_msg >>> msg: {:?}", msg);
        match msg {
            AriesMessage::OutOfBand(OutOfBand::Invitation(oob)) => {
                Ok(Self { oob: oob.clone() })
            }
            m => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInvitation,
                format!(
                    "Expected OutOfBandInvitation message to create OutOfBandReceiver, but \
                     received message of type: {}",
                    m.kind()
                ),
            )),
        }
    }

    pub fn create_from_url(url: &str) -> VcxResult<Self> {
        let url = Url::parse(url).map_err(|err| {
            AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInvitation, format!("Invalid url: {err}"))
        })?;
        let encoded = url
            .query_pairs()
            .find(|(key, _)| key == OOB_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                AriesVcxError::from_msg(
                    AriesVcxErrorKind::InvalidInvitation,
                    "Url carries no out-of-band invitation",
                )
            })?;
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|err| {
                AriesVcxError::from_msg(
                    AriesVcxErrorKind::InvalidInvitation,
                    format!("Cannot decode out-of-band invitation: {err}"),
                )
            })?;
        let msg = AriesMessage::from_slice(&bytes).map_err(|err| {
            AriesVcxError::from_msg(AriesVcxErrorKind::InvalidInvitation, err.to_string())
        })?;
        Self::create_from_a2a_msg(&msg)
    }

    pub fn get_id(&self) -> &str {
        &self.oob.id
    }

    pub fn has_handshake(&self) -> bool {
        self.oob
            .content
            .handshake_protocols
            .as_ref()
            .is_some_and(|protocols| protocols.iter().any(|p| p == HANDSHAKE_CONNECTIONS_V1))
    }

    /// The invitation to bootstrap a connection from, if a handshake was requested.
    pub fn connection_invitation(&self) -> Option<AnyInvitation> {
        self.has_handshake()
            .then(|| AnyInvitation::Oob(self.oob.clone()))
    }

    /// Attached requests, to be processed once the connection exists.
    pub fn extract_a2a_messages(&self) -> VcxResult<Vec<AriesMessage>> {
        trace!("OutOfBandReceiver::extract_a2a_messages >>>");
        let Some(attachments) = &self.oob.content.requests_attach else {
            return Ok(Vec::new());
        };
        attachments
            .iter()
            .map(|attachment| {
                let msg: AriesMessage = attachment.decode_payload()?;
                match msg {
                    AriesMessage::PresentProof(PresentProof::RequestPresentation(_))
                    | AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential(_)) => {
                        Ok(msg)
                    }
                    other => Err(AriesVcxError::from_msg(
                        AriesVcxErrorKind::InvalidMessageFormat,
                        format!("Attached message type {} is not allowed.", other.kind()),
                    )),
                }
            })
            .collect()
    }
}
