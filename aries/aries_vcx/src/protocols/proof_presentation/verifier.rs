use std::fmt;

use anoncreds_types::{
    data_types::{pres_request::PresentationRequestPayload, presentation::Presentation},
    utils::validation::Validatable,
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    decorators::{
        attachment::{decode_first, Attachment},
        timing::Timing,
    },
    msg_fields::protocols::{
        present_proof::{
            ack::AckPresentation,
            presentation::Presentation as PresentationMsg,
            request::{
                RequestPresentation, RequestPresentationContent, RequestPresentationDecorators,
            },
        },
        report_problem::ProblemReport,
    },
};
use uuid::Uuid;

use crate::{
    common::proofs::verifier::{verify_presentation, RejectionReason, VerificationResult},
    errors::error::prelude::*,
    global::settings::LedgerRetryPolicy,
    handlers::util::{verify_thread_id, AttachmentId},
    protocols::common::{build_ack_parts, build_problem_report_msg},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifierSM {
    thread_id: String,
    request: PresentationRequestPayload,
    state: VerifierFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifierState {
    RequestSent,
    PresentationReceived,
    Verified,
    Rejected,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerifierFullState {
    RequestSent(RequestSentState),
    PresentationReceived(PresentationReceivedState),
    Verified(VerifiedState),
    Rejected(RejectedState),
    Abandoned(AbandonedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestSentState {
    pub request_msg: RequestPresentation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationReceivedState {
    pub presentation: Presentation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedState {
    pub presentation: Presentation,
    pub ack: AckPresentation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedState {
    pub reason: RejectionReason,
    pub detail: String,
    /// Our report to the prover; `None` when the prover reported first.
    pub problem_report: Option<ProblemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedState {
    pub reason: String,
}

impl fmt::Display for VerifierFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerifierFullState::RequestSent(_) => f.write_str("RequestSent"),
            VerifierFullState::PresentationReceived(_) => f.write_str("PresentationReceived"),
            VerifierFullState::Verified(_) => f.write_str("Verified"),
            VerifierFullState::Rejected(_) => f.write_str("Rejected"),
            VerifierFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

impl VerifierSM {
    /// Builds the request message; its `@id` opens the thread.
    pub fn create_request(
        request: PresentationRequestPayload,
        comment: Option<String>,
    ) -> VcxResult<Self> {
        trace!("VerifierSM::create_request >>> request: {}", request.name);
        request.validate()?;
        let thread_id = Uuid::new_v4().to_string();
        let attach = vec![Attachment::from_payload(
            AttachmentId::PresentationRequest.as_ref(),
            &request,
        )?];
        let content = match comment {
            Some(comment) => RequestPresentationContent::builder()
                .comment(comment)
                .request_presentations_attach(attach)
                .build(),
            None => RequestPresentationContent::builder()
                .request_presentations_attach(attach)
                .build(),
        };
        let request_msg = RequestPresentation::builder()
            .id(thread_id.clone())
            .content(content)
            .decorators(
                RequestPresentationDecorators::builder()
                    .timing(Timing::now())
                    .build(),
            )
            .build();
        info!("Verifier {thread_id}: -> RequestSent");
        Ok(Self {
            thread_id,
            request,
            state: VerifierFullState::RequestSent(RequestSentState { request_msg }),
        })
    }

    pub fn receive_presentation(self, presentation: PresentationMsg) -> VcxResult<Self> {
        match self.state {
            VerifierFullState::RequestSent(_) => {
                verify_thread_id(&self.thread_id, &presentation.clone().into())?;
                let presentation: Presentation =
                    decode_first(&presentation.content.presentations_attach)?;
                info!("Verifier {}: RequestSent -> PresentationReceived", self.thread_id);
                Ok(Self {
                    state: VerifierFullState::PresentationReceived(PresentationReceivedState {
                        presentation,
                    }),
                    ..self
                })
            }
            VerifierFullState::Verified(_) | VerifierFullState::Rejected(_) => {
                debug!("Verifier {}: duplicate presentation ignored", self.thread_id);
                Ok(self)
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Verifier in state {s} cannot handle presentation"),
            )),
        }
    }

    /// Verifies the received presentation and prepares the ack or the problem report.
    /// Only ledger failures are errors.
    pub async fn verify(
        self,
        wallet: &dyn BaseWallet,
        ledger: &dyn AnoncredsLedgerRead,
        policy: &LedgerRetryPolicy,
    ) -> VcxResult<Self> {
        match self.state {
            VerifierFullState::PresentationReceived(state) => {
                let result =
                    verify_presentation(wallet, ledger, policy, &self.request, &state.presentation)
                        .await?;
                let state = match result {
                    VerificationResult::Verified => {
                        let (id, content, decorators) = build_ack_parts(&self.thread_id);
                        let ack = AckPresentation::builder()
                            .id(id)
                            .content(content.into())
                            .decorators(decorators)
                            .build();
                        info!("Verifier {}: PresentationReceived -> Verified", self.thread_id);
                        VerifierFullState::Verified(VerifiedState {
                            presentation: state.presentation,
                            ack,
                        })
                    }
                    VerificationResult::Rejected { reason, detail } => {
                        let problem_report = build_problem_report_msg(
                            reason.code(),
                            Some(detail.clone()),
                            &self.thread_id,
                        );
                        info!(
                            "Verifier {}: PresentationReceived -> Rejected ({reason})",
                            self.thread_id
                        );
                        VerifierFullState::Rejected(RejectedState {
                            reason,
                            detail,
                            problem_report: Some(problem_report),
                        })
                    }
                };
                Ok(Self { state, ..self })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Cannot verify in verifier state {s}"),
            )),
        }
    }

    pub fn receive_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        match self.state {
            VerifierFullState::RequestSent(_) | VerifierFullState::PresentationReceived(_) => {
                let reason = problem_report
                    .code()
                    .map(RejectionReason::from_code)
                    .unwrap_or(RejectionReason::Declined);
                let detail = problem_report.explain().unwrap_or_default().to_owned();
                info!("Verifier {}: {} -> Rejected ({reason})", self.thread_id, self.state);
                Ok(Self {
                    state: VerifierFullState::Rejected(RejectedState {
                        reason,
                        detail,
                        problem_report: None,
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Verifier in state {s} cannot handle problem report"),
            )),
        }
    }

    pub fn abandon(self, reason: &str) -> Self {
        if matches!(self.state, VerifierFullState::Abandoned(_)) {
            return self;
        }
        info!("Verifier {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        Self {
            state: VerifierFullState::Abandoned(AbandonedState {
                reason: reason.to_owned(),
            }),
            ..self
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn presentation_request(&self) -> &PresentationRequestPayload {
        &self.request
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            VerifierFullState::Verified(_)
                | VerifierFullState::Rejected(_)
                | VerifierFullState::Abandoned(_)
        )
    }

    pub fn get_state(&self) -> VerifierState {
        match self.state {
            VerifierFullState::RequestSent(_) => VerifierState::RequestSent,
            VerifierFullState::PresentationReceived(_) => VerifierState::PresentationReceived,
            VerifierFullState::Verified(_) => VerifierState::Verified,
            VerifierFullState::Rejected(_) => VerifierState::Rejected,
            VerifierFullState::Abandoned(_) => VerifierState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    pub fn get_request_msg(&self) -> VcxResult<&RequestPresentation> {
        match &self.state {
            VerifierFullState::RequestSent(state) => Ok(&state.request_msg),
            s => Err(not_available("Presentation request", s)),
        }
    }

    pub fn get_ack(&self) -> VcxResult<&AckPresentation> {
        match &self.state {
            VerifierFullState::Verified(state) => Ok(&state.ack),
            s => Err(not_available("Presentation ack", s)),
        }
    }

    pub fn get_problem_report(&self) -> Option<&ProblemReport> {
        match &self.state {
            VerifierFullState::Rejected(state) => state.problem_report.as_ref(),
            _ => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match &self.state {
            VerifierFullState::Rejected(state) => Some(state.reason),
            _ => None,
        }
    }

    pub fn presentation(&self) -> Option<&Presentation> {
        match &self.state {
            VerifierFullState::PresentationReceived(state) => Some(&state.presentation),
            VerifierFullState::Verified(state) => Some(&state.presentation),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match &self.state {
            VerifierFullState::Rejected(state) => Some(state.reason.code().to_owned()),
            VerifierFullState::Abandoned(state) => Some(state.reason.clone()),
            _ => None,
        }
    }
}

fn not_available(what: &str, state: &VerifierFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::InvalidState,
        format!("{what} is not available in verifier state {state}"),
    )
}
