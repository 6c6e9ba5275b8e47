use std::fmt;

use anoncreds_types::data_types::{
    credential::{AttributeValues, Credential, CredentialValues},
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    ledger::schema::Schema,
    messages::{cred_offer::CredentialOffer, cred_request::CredentialRequest},
    nonce::Nonce,
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    decorators::{
        attachment::{decode_first, Attachment},
        please_ack::{AckOn, PleaseAck},
        thread::Thread,
        timing::Timing,
    },
    msg_fields::protocols::{
        cred_issuance::{
            common::{CredentialAttr, CredentialPreview},
            issue_credential::{IssueCredential, IssueCredentialContent, IssueCredentialDecorators},
            offer_credential::{OfferCredential, OfferCredentialContent, OfferCredentialDecorators},
            request_credential::RequestCredential,
        },
        report_problem::ProblemReport,
    },
};
use uuid::Uuid;

use super::ensure_unique_names;
use crate::{
    common::{
        credentials::{encoding::encode_attribute, CredentialRecord},
        ledger::resolve_rev_reg,
        signing::sign_attribute,
    },
    errors::error::prelude::*,
    global::settings::LedgerRetryPolicy,
    handlers::util::AttachmentId,
    protocols::common::problem_report_reason,
};

/// What to offer: a schema, one value per schema attribute, optionally a revocation
/// registry the credential will be tracked in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferInfo {
    pub schema_id: SchemaId,
    pub attributes: Vec<CredentialAttr>,
    pub rev_reg_id: Option<RevocationRegistryId>,
    pub comment: Option<String>,
}

/// Identity the issuer signs with: its pairwise DID and key on the connection.
#[derive(Debug, Clone, Copy)]
pub struct IssuerKeys<'a> {
    pub did: &'a str,
    pub verkey: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuerSM {
    thread_id: String,
    state: IssuerFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerState {
    Initial,
    OfferSent,
    RequestReceived,
    IssueSent,
    Acked,
    Rejected,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IssuerFullState {
    Initial,
    OfferSent(OfferSentState),
    RequestReceived(RequestReceivedState),
    IssueSent(IssueSentState),
    Acked(AckedState),
    Rejected(FailedState),
    Abandoned(FailedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferSentState {
    pub offer: OfferCredential,
    pub credential_offer: CredentialOffer,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestReceivedState {
    pub credential_offer: CredentialOffer,
    pub request: CredentialRequest,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueSentState {
    pub issue: IssueCredential,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AckedState {
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedState {
    pub reason: String,
    pub record: Option<CredentialRecord>,
}

impl fmt::Display for IssuerFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IssuerFullState::Initial => f.write_str("Initial"),
            IssuerFullState::OfferSent(_) => f.write_str("OfferSent"),
            IssuerFullState::RequestReceived(_) => f.write_str("RequestReceived"),
            IssuerFullState::IssueSent(_) => f.write_str("IssueSent"),
            IssuerFullState::Acked(_) => f.write_str("Acked"),
            IssuerFullState::Rejected(_) => f.write_str("Rejected"),
            IssuerFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

/// Attribute names of an offer must equal the schema's attribute names.
fn check_attributes_match_schema(schema: &Schema, attributes: &[CredentialAttr]) -> VcxResult<()> {
    ensure_unique_names(attributes)?;
    let unknown: Vec<&str> = attributes
        .iter()
        .map(|attr| attr.name.as_str())
        .filter(|name| !schema.has_attribute(name))
        .collect();
    let missing: Vec<&str> = schema
        .attr_names
        .0
        .iter()
        .map(String::as_str)
        .filter(|name| !attributes.iter().any(|attr| attr.name == *name))
        .collect();
    if !unknown.is_empty() || !missing.is_empty() {
        return Err(AriesVcxError::from_msg(
            AriesVcxErrorKind::SchemaMismatch,
            format!(
                "Attributes do not match schema {}: unknown {:?}, missing {:?}",
                schema.id, unknown, missing
            ),
        ));
    }
    Ok(())
}

impl Default for IssuerSM {
    fn default() -> Self {
        Self::new()
    }
}

impl IssuerSM {
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            state: IssuerFullState::Initial,
        }
    }

    /// Builds the offer. The offer `@id` is the thread id.
    pub fn build_offer(self, schema: &Schema, offer_info: OfferInfo, issuer_did: &str) -> VcxResult<Self> {
        trace!(
            "IssuerSM::build_offer >>> schema: {}, attributes: {:?}",
            schema.id,
            offer_info.attributes
        );
        match self.state {
            IssuerFullState::Initial => {
                if schema.id != offer_info.schema_id {
                    return Err(AriesVcxError::from_msg(
                        AriesVcxErrorKind::SchemaMismatch,
                        format!("Offer names schema {} but {} was resolved", offer_info.schema_id, schema.id),
                    ));
                }
                check_attributes_match_schema(schema, &offer_info.attributes)?;

                let credential_offer = CredentialOffer {
                    schema_id: offer_info.schema_id.clone(),
                    rev_reg_id: offer_info.rev_reg_id.clone(),
                    issuer_did: issuer_did.to_owned(),
                    nonce: Nonce::new(),
                };
                let content = OfferCredentialContent::builder()
                    .credential_preview(CredentialPreview::new(offer_info.attributes.clone()))
                    .offers_attach(vec![Attachment::from_payload(
                        AttachmentId::CredentialOffer.as_ref(),
                        &credential_offer,
                    )?]);
                let content = match offer_info.comment {
                    Some(comment) => content.comment(comment).build(),
                    None => content.build(),
                };
                let offer = OfferCredential::builder()
                    .id(self.thread_id.clone())
                    .content(content)
                    .decorators(OfferCredentialDecorators::builder().timing(Timing::now()).build())
                    .build();
                let record = CredentialRecord::new(
                    &self.thread_id,
                    offer_info.schema_id,
                    offer_info.rev_reg_id,
                    &offer_info.attributes,
                );
                info!("Issuer {}: Initial -> OfferSent", self.thread_id);
                Ok(Self {
                    state: IssuerFullState::OfferSent(OfferSentState {
                        offer,
                        credential_offer,
                        record,
                    }),
                    ..self
                })
            }
            s => Err(wrong_state("send offer", &s)),
        }
    }

    pub fn receive_request(self, request: RequestCredential) -> VcxResult<Self> {
        match self.state {
            IssuerFullState::OfferSent(state) => {
                let credential_request: CredentialRequest =
                    decode_first(&request.content.requests_attach)?;
                if credential_request.nonce != state.credential_offer.nonce
                    || credential_request.schema_id != state.credential_offer.schema_id
                {
                    return Err(AriesVcxError::from_msg(
                        AriesVcxErrorKind::InvalidInput,
                        format!(
                            "Credential request {} does not answer the offer of thread {}",
                            request.id, self.thread_id
                        ),
                    ));
                }
                info!("Issuer {}: OfferSent -> RequestReceived", self.thread_id);
                Ok(Self {
                    state: IssuerFullState::RequestReceived(RequestReceivedState {
                        credential_offer: state.credential_offer,
                        request: credential_request,
                        record: state.record,
                    }),
                    ..self
                })
            }
            s => Err(unexpected("credential request", &s)),
        }
    }

    /// Encodes and signs every attribute. A revocable offer first needs its registry to be
    /// resolvable.
    pub async fn issue_credential(
        self,
        wallet: &dyn BaseWallet,
        ledger: &dyn AnoncredsLedgerRead,
        policy: &LedgerRetryPolicy,
        keys: IssuerKeys<'_>,
    ) -> VcxResult<Self> {
        match self.state {
            IssuerFullState::RequestReceived(state) => {
                let mut record = state.record;
                if let Some(rev_reg_id) = &record.rev_reg_id {
                    resolve_rev_reg(ledger, policy, rev_reg_id, None).await?;
                }

                let cred_id = Uuid::new_v4().to_string();
                let mut values = CredentialValues::default();
                for (name, raw) in &record.attributes {
                    let encoded = encode_attribute(wallet, raw).await?;
                    let signature = sign_attribute(
                        wallet,
                        keys.verkey,
                        &cred_id,
                        &record.schema_id,
                        name,
                        &encoded,
                    )
                    .await?;
                    values.0.insert(
                        name.clone(),
                        AttributeValues {
                            raw: raw.clone(),
                            encoded,
                            signature,
                        },
                    );
                }
                let credential = Credential {
                    cred_id,
                    schema_id: record.schema_id.clone(),
                    issuer_did: keys.did.to_owned(),
                    issuer_verkey: keys.verkey.to_owned(),
                    rev_reg_id: record.rev_reg_id.clone(),
                    values,
                };

                let content = IssueCredentialContent::builder()
                    .credentials_attach(vec![Attachment::from_payload(
                        AttachmentId::Credential.as_ref(),
                        &credential,
                    )?])
                    .build();
                let decorators = IssueCredentialDecorators::builder()
                    .thread(Thread::builder().thid(self.thread_id.clone()).build())
                    .please_ack(PleaseAck::builder().on(vec![AckOn::Outcome]).build())
                    .timing(Timing::now())
                    .build();
                let issue = IssueCredential::builder()
                    .id(Uuid::new_v4().to_string())
                    .content(content)
                    .decorators(decorators)
                    .build();
                record.set_credential(credential)?;
                info!("Issuer {}: RequestReceived -> IssueSent", self.thread_id);
                Ok(Self {
                    state: IssuerFullState::IssueSent(IssueSentState { issue, record }),
                    ..self
                })
            }
            s => Err(wrong_state("issue credential", &s)),
        }
    }

    pub fn receive_ack(self) -> VcxResult<Self> {
        match self.state {
            IssuerFullState::IssueSent(state) => {
                let mut record = state.record;
                record.finalize();
                info!("Issuer {}: IssueSent -> Acked", self.thread_id);
                Ok(Self {
                    state: IssuerFullState::Acked(AckedState { record }),
                    ..self
                })
            }
            IssuerFullState::Acked(_) => {
                debug!("Issuer {}: duplicate ack ignored", self.thread_id);
                Ok(self)
            }
            s => Err(unexpected("credential ack", &s)),
        }
    }

    pub fn receive_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        if self.is_terminal() {
            return Err(unexpected("problem report", &self.state));
        }
        let reason = problem_report_reason(&problem_report);
        info!("Issuer {}: {} -> Rejected ({reason})", self.thread_id, self.state);
        let record = self.take_record();
        Ok(Self {
            state: IssuerFullState::Rejected(FailedState { reason, record }),
            ..self
        })
    }

    pub fn abandon(self, reason: &str) -> Self {
        if matches!(self.state, IssuerFullState::Abandoned(_)) {
            return self;
        }
        info!("Issuer {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        let record = self.take_record();
        Self {
            state: IssuerFullState::Abandoned(FailedState {
                reason: reason.to_owned(),
                record,
            }),
            ..self
        }
    }

    fn take_record(&self) -> Option<CredentialRecord> {
        self.record().cloned()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            IssuerFullState::Acked(_) | IssuerFullState::Rejected(_) | IssuerFullState::Abandoned(_)
        )
    }

    pub fn get_state(&self) -> IssuerState {
        match self.state {
            IssuerFullState::Initial => IssuerState::Initial,
            IssuerFullState::OfferSent(_) => IssuerState::OfferSent,
            IssuerFullState::RequestReceived(_) => IssuerState::RequestReceived,
            IssuerFullState::IssueSent(_) => IssuerState::IssueSent,
            IssuerFullState::Acked(_) => IssuerState::Acked,
            IssuerFullState::Rejected(_) => IssuerState::Rejected,
            IssuerFullState::Abandoned(_) => IssuerState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    pub fn get_offer(&self) -> VcxResult<&OfferCredential> {
        match &self.state {
            IssuerFullState::OfferSent(state) => Ok(&state.offer),
            s => Err(not_available("Credential offer", s)),
        }
    }

    pub fn get_issue(&self) -> VcxResult<&IssueCredential> {
        match &self.state {
            IssuerFullState::IssueSent(state) => Ok(&state.issue),
            s => Err(not_available("Issued credential", s)),
        }
    }

    pub fn record(&self) -> Option<&CredentialRecord> {
        match &self.state {
            IssuerFullState::Initial => None,
            IssuerFullState::OfferSent(state) => Some(&state.record),
            IssuerFullState::RequestReceived(state) => Some(&state.record),
            IssuerFullState::IssueSent(state) => Some(&state.record),
            IssuerFullState::Acked(state) => Some(&state.record),
            IssuerFullState::Rejected(state) | IssuerFullState::Abandoned(state) => {
                state.record.as_ref()
            }
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            IssuerFullState::Rejected(state) | IssuerFullState::Abandoned(state) => {
                Some(&state.reason)
            }
            _ => None,
        }
    }
}

fn wrong_state(operation: &str, state: &IssuerFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::WrongState,
        format!("Cannot {operation} in issuer state {state}"),
    )
}

fn unexpected(message: &str, state: &IssuerFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::UnexpectedMessage,
        format!("Issuer in state {state} cannot handle {message}"),
    )
}

fn not_available(what: &str, state: &IssuerFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::InvalidState,
        format!("{what} is not available in issuer state {state}"),
    )
}
