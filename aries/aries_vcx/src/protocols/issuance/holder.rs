use std::fmt;

use anoncreds_types::data_types::{
    credential::Credential,
    messages::{cred_offer::CredentialOffer, cred_request::CredentialRequest},
};
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    decorators::{
        attachment::{decode_first, Attachment},
        thread::Thread,
        timing::Timing,
    },
    msg_fields::protocols::{
        cred_issuance::{
            ack::AckCredential,
            issue_credential::IssueCredential,
            offer_credential::OfferCredential,
            request_credential::{
                RequestCredential, RequestCredentialContent, RequestCredentialDecorators,
            },
        },
        report_problem::ProblemReport,
    },
};
use uuid::Uuid;

use super::ensure_unique_names;
use crate::{
    common::{
        credentials::{encoding::encoding_matches, CredentialRecord},
        signing::verify_attribute,
    },
    errors::error::prelude::*,
    handlers::util::{verify_thread_id, AttachmentId},
    protocols::common::{build_ack_parts, build_problem_report_msg, problem_report_reason},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HolderSM {
    thread_id: String,
    state: HolderFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolderState {
    OfferReceived,
    RequestSent,
    IssueReceived,
    Acked,
    Rejected,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HolderFullState {
    OfferReceived(OfferReceivedState),
    RequestSent(RequestSentState),
    IssueReceived(IssueReceivedState),
    Acked(AckedState),
    Rejected(RejectedState),
    Abandoned(AbandonedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferReceivedState {
    pub offer: OfferCredential,
    pub credential_offer: CredentialOffer,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestSentState {
    pub credential_offer: CredentialOffer,
    pub request: RequestCredential,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueReceivedState {
    pub issue: IssueCredential,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AckedState {
    pub ack: AckCredential,
    pub record: CredentialRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedState {
    pub reason: String,
    /// Set when the rejection was ours.
    pub problem_report: Option<ProblemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedState {
    pub reason: String,
}

impl fmt::Display for HolderFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HolderFullState::OfferReceived(_) => f.write_str("OfferReceived"),
            HolderFullState::RequestSent(_) => f.write_str("RequestSent"),
            HolderFullState::IssueReceived(_) => f.write_str("IssueReceived"),
            HolderFullState::Acked(_) => f.write_str("Acked"),
            HolderFullState::Rejected(_) => f.write_str("Rejected"),
            HolderFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

fn crypto_err(msg: String) -> AriesVcxError {
    error!("Received credential rejected: {msg}");
    AriesVcxError::from_msg(AriesVcxErrorKind::AuthenticationError, msg)
}

impl HolderSM {
    /// Starts a holder thread from a received offer. The thread id is the offer's thread,
    /// or its `@id` when it opens one.
    pub fn from_offer(offer: OfferCredential) -> VcxResult<Self> {
        trace!("HolderSM::from_offer >>> offer id: {}", offer.id);
        let thread_id = offer
            .decorators
            .thread
            .as_ref()
            .map(|thread| thread.thid.clone())
            .unwrap_or_else(|| offer.id.clone());
        let credential_offer: CredentialOffer = decode_first(&offer.content.offers_attach)?;
        let attributes = &offer.content.credential_preview.attributes;
        ensure_unique_names(attributes)?;
        let record = CredentialRecord::new(
            &thread_id,
            credential_offer.schema_id.clone(),
            credential_offer.rev_reg_id.clone(),
            attributes,
        );
        info!("Holder {thread_id}: -> OfferReceived");
        Ok(Self {
            thread_id,
            state: HolderFullState::OfferReceived(OfferReceivedState {
                offer,
                credential_offer,
                record,
            }),
        })
    }

    pub fn send_request(self, prover_did: &str) -> VcxResult<Self> {
        match self.state {
            HolderFullState::OfferReceived(state) => {
                let credential_request = CredentialRequest {
                    prover_did: prover_did.to_owned(),
                    schema_id: state.credential_offer.schema_id.clone(),
                    nonce: state.credential_offer.nonce.clone(),
                };
                let content = RequestCredentialContent::builder()
                    .requests_attach(vec![Attachment::from_payload(
                        AttachmentId::CredentialRequest.as_ref(),
                        &credential_request,
                    )?])
                    .build();
                let decorators = RequestCredentialDecorators::builder()
                    .thread(Thread::builder().thid(self.thread_id.clone()).build())
                    .timing(Timing::now())
                    .build();
                let request = RequestCredential::builder()
                    .id(Uuid::new_v4().to_string())
                    .content(content)
                    .decorators(decorators)
                    .build();
                info!("Holder {}: OfferReceived -> RequestSent", self.thread_id);
                Ok(Self {
                    state: HolderFullState::RequestSent(RequestSentState {
                        credential_offer: state.credential_offer,
                        request,
                        record: state.record,
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::NoActiveOffer,
                format!("Holder {} has no offer to request on, state {s}", self.thread_id),
            )),
        }
    }

    /// Accepts the credential only if it is the one offered, signed by `issuer_vk` and
    /// encoded the way this wallet encodes.
    pub async fn receive_credential(
        self,
        wallet: &dyn BaseWallet,
        issue: IssueCredential,
        issuer_vk: &str,
    ) -> VcxResult<Self> {
        match self.state {
            HolderFullState::RequestSent(state) => {
                verify_thread_id(&self.thread_id, &issue.clone().into())?;
                let credential: Credential = decode_first(&issue.content.credentials_attach)?;
                check_credential(wallet, &state.credential_offer, &state.record, &credential, issuer_vk)
                    .await?;
                let mut record = state.record;
                record.set_credential(credential)?;
                info!("Holder {}: RequestSent -> IssueReceived", self.thread_id);
                Ok(Self {
                    state: HolderFullState::IssueReceived(IssueReceivedState { issue, record }),
                    ..self
                })
            }
            HolderFullState::IssueReceived(_) | HolderFullState::Acked(_) => {
                debug!("Holder {}: duplicate credential ignored", self.thread_id);
                Ok(self)
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Holder in state {s} cannot handle credential"),
            )),
        }
    }

    /// Finalizes the record; it becomes usable for presentations.
    pub fn send_ack(self) -> VcxResult<Self> {
        match self.state {
            HolderFullState::IssueReceived(state) => {
                let (id, content, decorators) = build_ack_parts(&self.thread_id);
                let ack = AckCredential::builder()
                    .id(id)
                    .content(content.into())
                    .decorators(decorators)
                    .build();
                let mut record = state.record;
                record.finalize();
                info!("Holder {}: IssueReceived -> Acked", self.thread_id);
                Ok(Self {
                    state: HolderFullState::Acked(AckedState { ack, record }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Cannot ack credential in holder state {s}"),
            )),
        }
    }

    pub fn decline_offer(self, reason: &str) -> VcxResult<Self> {
        match self.state {
            HolderFullState::OfferReceived(_) => {
                let problem_report = build_problem_report_msg(
                    "offer-declined",
                    Some(reason.to_owned()),
                    &self.thread_id,
                );
                info!("Holder {}: OfferReceived -> Rejected ({reason})", self.thread_id);
                Ok(Self {
                    state: HolderFullState::Rejected(RejectedState {
                        reason: reason.to_owned(),
                        problem_report: Some(problem_report),
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::NoActiveOffer,
                format!("Holder {} has no offer to decline, state {s}", self.thread_id),
            )),
        }
    }

    pub fn receive_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        if self.is_terminal() {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Holder in state {} cannot handle problem report", self.state),
            ));
        }
        let reason = problem_report_reason(&problem_report);
        info!("Holder {}: {} -> Rejected ({reason})", self.thread_id, self.state);
        Ok(Self {
            state: HolderFullState::Rejected(RejectedState {
                reason,
                problem_report: None,
            }),
            ..self
        })
    }

    pub fn abandon(self, reason: &str) -> Self {
        if matches!(self.state, HolderFullState::Abandoned(_)) {
            return self;
        }
        info!("Holder {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        Self {
            state: HolderFullState::Abandoned(AbandonedState {
                reason: reason.to_owned(),
            }),
            ..self
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            HolderFullState::Acked(_) | HolderFullState::Rejected(_) | HolderFullState::Abandoned(_)
        )
    }

    pub fn get_state(&self) -> HolderState {
        match self.state {
            HolderFullState::OfferReceived(_) => HolderState::OfferReceived,
            HolderFullState::RequestSent(_) => HolderState::RequestSent,
            HolderFullState::IssueReceived(_) => HolderState::IssueReceived,
            HolderFullState::Acked(_) => HolderState::Acked,
            HolderFullState::Rejected(_) => HolderState::Rejected,
            HolderFullState::Abandoned(_) => HolderState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    pub fn get_offer(&self) -> VcxResult<&OfferCredential> {
        match &self.state {
            HolderFullState::OfferReceived(state) => Ok(&state.offer),
            s => Err(not_available("Credential offer", s)),
        }
    }

    pub fn get_request(&self) -> VcxResult<&RequestCredential> {
        match &self.state {
            HolderFullState::RequestSent(state) => Ok(&state.request),
            s => Err(not_available("Credential request", s)),
        }
    }

    pub fn get_ack(&self) -> VcxResult<&AckCredential> {
        match &self.state {
            HolderFullState::Acked(state) => Ok(&state.ack),
            s => Err(not_available("Credential ack", s)),
        }
    }

    pub fn get_problem_report(&self) -> Option<&ProblemReport> {
        match &self.state {
            HolderFullState::Rejected(state) => state.problem_report.as_ref(),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&CredentialRecord> {
        match &self.state {
            HolderFullState::OfferReceived(state) => Some(&state.record),
            HolderFullState::RequestSent(state) => Some(&state.record),
            HolderFullState::IssueReceived(state) => Some(&state.record),
            HolderFullState::Acked(state) => Some(&state.record),
            HolderFullState::Rejected(_) | HolderFullState::Abandoned(_) => None,
        }
    }

    /// The credential once the record is finalized.
    pub fn credential(&self) -> Option<&Credential> {
        self.record().and_then(CredentialRecord::usable_credential)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            HolderFullState::Rejected(state) => Some(&state.reason),
            HolderFullState::Abandoned(state) => Some(&state.reason),
            _ => None,
        }
    }
}

async fn check_credential(
    wallet: &dyn BaseWallet,
    credential_offer: &CredentialOffer,
    record: &CredentialRecord,
    credential: &Credential,
    issuer_vk: &str,
) -> VcxResult<()> {
    if credential.schema_id != credential_offer.schema_id
        || credential.rev_reg_id != credential_offer.rev_reg_id
    {
        return Err(crypto_err(format!(
            "Credential {} is not for the offered schema or registry",
            credential.cred_id
        )));
    }
    if credential.issuer_did != credential_offer.issuer_did || credential.issuer_verkey != issuer_vk {
        return Err(crypto_err(format!(
            "Credential {} is not issued by the offering party",
            credential.cred_id
        )));
    }
    if credential.values.0.len() != record.attributes.len() {
        return Err(crypto_err(format!(
            "Credential {} carries {} attributes, {} were offered",
            credential.cred_id,
            credential.values.0.len(),
            record.attributes.len()
        )));
    }
    for (name, offered) in &record.attributes {
        let values = credential.values.0.get(name).ok_or_else(|| {
            crypto_err(format!("Offered attribute {name} missing from credential"))
        })?;
        if values.raw != *offered {
            return Err(crypto_err(format!(
                "Attribute {name} differs from the offered value"
            )));
        }
        if !verify_attribute(
            wallet,
            issuer_vk,
            &credential.cred_id,
            &credential.schema_id,
            name,
            values,
        )
        .await?
        {
            return Err(crypto_err(format!("Signature of attribute {name} is invalid")));
        }
        if !encoding_matches(wallet, &values.raw, &values.encoded).await? {
            return Err(crypto_err(format!("Encoding of attribute {name} does not match")));
        }
    }
    Ok(())
}

fn not_available(what: &str, state: &HolderFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::InvalidState,
        format!("{what} is not available in holder state {state}"),
    )
}

#[cfg(test)]
pub mod unit_tests {
    use anoncreds_types::data_types::{
        identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
        ledger::{rev_reg::RevocationRegistry, schema::Schema},
    };
    use aries_vcx_wallet::wallet::base_wallet::did_wallet::DidWallet;
    use messages::msg_fields::protocols::{
        cred_issuance::common::CredentialAttr,
        notification::ack::AckStatus,
    };
    use test_utils::{dev_wallet::DevWallet, in_memory_ledger::InMemoryLedger};

    use super::*;
    use crate::{
        global::settings::LedgerRetryPolicy,
        protocols::issuance::issuer::{IssuerKeys, IssuerSM, IssuerState, OfferInfo},
    };

    const POLICY: LedgerRetryPolicy = LedgerRetryPolicy {
        max_retries: 1,
        backoff_ms: 1,
    };

    pub struct IssuanceSetup {
        pub wallet: DevWallet,
        pub ledger: InMemoryLedger,
        pub schema: Schema,
        pub issuer_did: String,
        pub issuer_vk: String,
    }

    impl IssuanceSetup {
        pub async fn new() -> Self {
            let wallet = DevWallet::new();
            let ledger = InMemoryLedger::new();
            let issuer = wallet.create_and_store_my_did(None).await.unwrap();
            let schema = ledger.create_schema(issuer.did(), "person", &["name", "age"]);
            Self {
                issuer_did: issuer.did().to_owned(),
                issuer_vk: issuer.verkey().base58(),
                wallet,
                ledger,
                schema,
            }
        }

        pub fn offer_info(&self, rev_reg_id: Option<RevocationRegistryId>) -> OfferInfo {
            OfferInfo {
                schema_id: self.schema.id.clone(),
                attributes: vec![
                    CredentialAttr::new("name", "Alice"),
                    CredentialAttr::new("age", "30"),
                ],
                rev_reg_id,
                comment: Some("person credential".to_owned()),
            }
        }

        fn keys(&self) -> IssuerKeys<'_> {
            IssuerKeys {
                did: &self.issuer_did,
                verkey: &self.issuer_vk,
            }
        }

        /// Runs issuer and holder up to the point where the holder holds the credential.
        pub async fn run_to_issue(
            &self,
            rev_reg_id: Option<RevocationRegistryId>,
        ) -> VcxResult<(IssuerSM, HolderSM)> {
            let issuer = IssuerSM::new().build_offer(
                &self.schema,
                self.offer_info(rev_reg_id),
                &self.issuer_did,
            )?;
            let holder = HolderSM::from_offer(issuer.get_offer()?.clone())?;
            let holder = holder.send_request("prover-did")?;
            let issuer = issuer.receive_request(holder.get_request()?.clone())?;
            let issuer = issuer
                .issue_credential(&self.wallet, &self.ledger, &POLICY, self.keys())
                .await?;
            let holder = holder
                .receive_credential(&self.wallet, issuer.get_issue()?.clone(), &self.issuer_vk)
                .await?;
            Ok((issuer, holder))
        }
    }

    #[tokio::test]
    async fn test_issuance_reaches_acked_on_both_sides() {
        let setup = IssuanceSetup::new().await;
        let (issuer, holder) = setup.run_to_issue(None).await.unwrap();
        assert_eq!(issuer.get_state(), IssuerState::IssueSent);
        assert_eq!(holder.get_state(), HolderState::IssueReceived);
        assert!(holder.credential().is_none());

        let holder = holder.send_ack().unwrap();
        let ack = holder.get_ack().unwrap();
        assert_eq!(ack.content.inner.status, AckStatus::Ok);
        assert_eq!(ack.decorators.thread.thid, issuer.thread_id());

        let issuer = issuer.receive_ack().unwrap();
        assert_eq!(issuer.get_state(), IssuerState::Acked);
        assert!(issuer.record().unwrap().finalized);
        let credential = holder.credential().unwrap();
        assert_eq!(credential.values.0["age"].encoded, "30");
        assert_eq!(credential.issuer_did, setup.issuer_did);

        let issuer = issuer.receive_ack().unwrap();
        assert_eq!(issuer.get_state(), IssuerState::Acked);
    }

    #[tokio::test]
    async fn test_offer_must_match_schema() {
        let setup = IssuanceSetup::new().await;
        let mut info = setup.offer_info(None);
        info.attributes.push(CredentialAttr::new("height", "170"));
        let err = IssuerSM::new()
            .build_offer(&setup.schema, info, &setup.issuer_did)
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::SchemaMismatch);

        let mut info = setup.offer_info(None);
        info.attributes.pop();
        let err = IssuerSM::new()
            .build_offer(&setup.schema, info, &setup.issuer_did)
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::SchemaMismatch);

        let mut info = setup.offer_info(None);
        info.schema_id = SchemaId::new_unchecked("other:2:person:1.0");
        let err = IssuerSM::new()
            .build_offer(&setup.schema, info, &setup.issuer_did)
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn test_revocable_issuance_needs_registry() {
        let setup = IssuanceSetup::new().await;
        let rev_reg_id = RevocationRegistryId::new_unchecked("rev-reg-1");
        let err = setup
            .run_to_issue(Some(rev_reg_id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::RevocationRegistryUnavailable);
        assert!(err.category().abandons_thread());

        setup
            .ledger
            .publish_rev_reg(RevocationRegistry::new(rev_reg_id.clone(), 100));
        let (_, holder) = setup.run_to_issue(Some(rev_reg_id.clone())).await.unwrap();
        let holder = holder.send_ack().unwrap();
        assert_eq!(holder.credential().unwrap().rev_reg_id, Some(rev_reg_id));
    }

    #[tokio::test]
    async fn test_holder_rejects_credential_from_other_key() {
        let setup = IssuanceSetup::new().await;
        let issuer = IssuerSM::new()
            .build_offer(&setup.schema, setup.offer_info(None), &setup.issuer_did)
            .unwrap();
        let holder = HolderSM::from_offer(issuer.get_offer().unwrap().clone())
            .unwrap()
            .send_request("prover-did")
            .unwrap();
        let issuer = issuer
            .receive_request(holder.get_request().unwrap().clone())
            .unwrap()
            .issue_credential(&setup.wallet, &setup.ledger, &POLICY, setup.keys())
            .await
            .unwrap();

        let other = setup.wallet.create_and_store_my_did(None).await.unwrap();
        let err = holder
            .receive_credential(
                &setup.wallet,
                issuer.get_issue().unwrap().clone(),
                &other.verkey().base58(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Crypto);
    }

    #[tokio::test]
    async fn test_holder_rejects_tampered_encoding() {
        let setup = IssuanceSetup::new().await;
        let issuer = IssuerSM::new()
            .build_offer(&setup.schema, setup.offer_info(None), &setup.issuer_did)
            .unwrap();
        let holder = HolderSM::from_offer(issuer.get_offer().unwrap().clone())
            .unwrap()
            .send_request("prover-did")
            .unwrap();
        let issuer = issuer
            .receive_request(holder.get_request().unwrap().clone())
            .unwrap()
            .issue_credential(&setup.wallet, &setup.ledger, &POLICY, setup.keys())
            .await
            .unwrap();

        let mut issue = issuer.get_issue().unwrap().clone();
        let mut credential: Credential = decode_first(&issue.content.credentials_attach).unwrap();
        credential.values.0.get_mut("age").unwrap().encoded = "31".to_owned();
        issue.content.credentials_attach =
            vec![Attachment::from_payload(AttachmentId::Credential.as_ref(), &credential).unwrap()];

        let err = holder
            .receive_credential(&setup.wallet, issue, &setup.issuer_vk)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn test_request_without_offer_fails() {
        let setup = IssuanceSetup::new().await;
        let issuer = IssuerSM::new()
            .build_offer(&setup.schema, setup.offer_info(None), &setup.issuer_did)
            .unwrap();
        let holder = HolderSM::from_offer(issuer.get_offer().unwrap().clone())
            .unwrap()
            .send_request("prover-did")
            .unwrap();
        let err = holder.send_request("prover-did").unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::NoActiveOffer);
    }

    #[tokio::test]
    async fn test_decline_offer_and_issuer_rejection() {
        let setup = IssuanceSetup::new().await;
        let issuer = IssuerSM::new()
            .build_offer(&setup.schema, setup.offer_info(None), &setup.issuer_did)
            .unwrap();
        let holder = HolderSM::from_offer(issuer.get_offer().unwrap().clone())
            .unwrap()
            .decline_offer("not interested")
            .unwrap();
        assert_eq!(holder.get_state(), HolderState::Rejected);
        let problem_report = holder.get_problem_report().unwrap().clone();
        assert_eq!(problem_report.decorators.thread.thid, issuer.thread_id());

        let issuer = issuer.receive_problem_report(problem_report).unwrap();
        assert_eq!(issuer.get_state(), IssuerState::Rejected);
        assert_eq!(issuer.failure_reason(), Some("offer-declined"));
    }

    #[tokio::test]
    async fn test_abandon_keeps_record_on_issuer() {
        let setup = IssuanceSetup::new().await;
        let issuer = IssuerSM::new()
            .build_offer(&setup.schema, setup.offer_info(None), &setup.issuer_did)
            .unwrap()
            .abandon("timed out");
        assert_eq!(issuer.get_state(), IssuerState::Abandoned);
        assert_eq!(issuer.failure_reason(), Some("timed out"));
        assert!(issuer.record().is_some());
        let err = issuer.receive_ack().unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::UnexpectedMessage);
    }
}
