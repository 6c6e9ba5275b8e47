use std::fmt;

use anoncreds_types::data_types::{
    credential::Credential, pres_request::PresentationRequestPayload, presentation::Presentation,
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;
use messages::{
    decorators::{
        attachment::{decode_first, Attachment},
        please_ack::{AckOn, PleaseAck},
        thread::Thread,
        timing::Timing,
    },
    msg_fields::protocols::{
        present_proof::{
            ack::AckPresentation,
            presentation::{
                Presentation as PresentationMsg, PresentationContent, PresentationDecorators,
            },
            request::RequestPresentation,
        },
        report_problem::ProblemReport,
    },
};
use uuid::Uuid;

use crate::{
    common::proofs::{prover::build_presentation, verifier::RejectionReason},
    errors::error::prelude::*,
    global::settings::LedgerRetryPolicy,
    handlers::util::{verify_thread_id, AttachmentId},
    protocols::common::{build_problem_report_msg, problem_report_reason},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProverSM {
    thread_id: String,
    request: PresentationRequestPayload,
    state: ProverFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProverState {
    RequestReceived,
    PresentationSent,
    Verified,
    Rejected,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProverFullState {
    RequestReceived(RequestReceivedState),
    PresentationSent(PresentationSentState),
    Verified(VerifiedState),
    Rejected(RejectedState),
    Abandoned(AbandonedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestReceivedState {
    pub request_msg: RequestPresentation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationSentState {
    pub presentation_msg: PresentationMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedState {
    pub presentation_msg: PresentationMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedState {
    pub reason: String,
    pub problem_report: Option<ProblemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedState {
    pub reason: String,
}

impl fmt::Display for ProverFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProverFullState::RequestReceived(_) => f.write_str("RequestReceived"),
            ProverFullState::PresentationSent(_) => f.write_str("PresentationSent"),
            ProverFullState::Verified(_) => f.write_str("Verified"),
            ProverFullState::Rejected(_) => f.write_str("Rejected"),
            ProverFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

impl ProverSM {
    pub fn from_request(request_msg: RequestPresentation) -> VcxResult<Self> {
        let thread_id = request_msg
            .decorators
            .thread
            .as_ref()
            .map(|thread| thread.thid.clone())
            .unwrap_or_else(|| request_msg.id.clone());
        let request: PresentationRequestPayload =
            decode_first(&request_msg.content.request_presentations_attach)?;
        info!("Prover {thread_id}: -> RequestReceived ({})", request.name);
        Ok(Self {
            thread_id,
            request,
            state: ProverFullState::RequestReceived(RequestReceivedState { request_msg }),
        })
    }

    /// Builds the presentation from the given credentials. `NoMatchingCredential` leaves
    /// the thread where it was so the caller can decline.
    pub async fn send_presentation(
        self,
        ledger: &dyn AnoncredsLedgerRead,
        policy: &LedgerRetryPolicy,
        credentials: &[Credential],
    ) -> VcxResult<Self> {
        match self.state {
            ProverFullState::RequestReceived(_) => {
                let presentation: Presentation =
                    build_presentation(ledger, policy, &self.request, credentials).await?;
                let content = PresentationContent::builder()
                    .presentations_attach(vec![Attachment::from_payload(
                        AttachmentId::Presentation.as_ref(),
                        &presentation,
                    )?])
                    .build();
                let decorators = PresentationDecorators::builder()
                    .thread(Thread::builder().thid(self.thread_id.clone()).build())
                    .please_ack(PleaseAck::builder().on(vec![AckOn::Outcome]).build())
                    .timing(Timing::now())
                    .build();
                let presentation_msg = PresentationMsg::builder()
                    .id(Uuid::new_v4().to_string())
                    .content(content)
                    .decorators(decorators)
                    .build();
                info!("Prover {}: RequestReceived -> PresentationSent", self.thread_id);
                Ok(Self {
                    state: ProverFullState::PresentationSent(PresentationSentState {
                        presentation_msg,
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Cannot present in prover state {s}"),
            )),
        }
    }

    pub fn decline_presentation_request(self, reason: &str) -> VcxResult<Self> {
        match self.state {
            ProverFullState::RequestReceived(_) => {
                let problem_report = build_problem_report_msg(
                    RejectionReason::Declined.code(),
                    Some(reason.to_owned()),
                    &self.thread_id,
                );
                info!("Prover {}: RequestReceived -> Rejected ({reason})", self.thread_id);
                Ok(Self {
                    state: ProverFullState::Rejected(RejectedState {
                        reason: reason.to_owned(),
                        problem_report: Some(problem_report),
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Cannot decline in prover state {s}"),
            )),
        }
    }

    pub fn receive_ack(self, ack: AckPresentation) -> VcxResult<Self> {
        match self.state {
            ProverFullState::PresentationSent(state) => {
                verify_thread_id(&self.thread_id, &ack.into())?;
                info!("Prover {}: PresentationSent -> Verified", self.thread_id);
                Ok(Self {
                    state: ProverFullState::Verified(VerifiedState {
                        presentation_msg: state.presentation_msg,
                    }),
                    ..self
                })
            }
            ProverFullState::Verified(_) => {
                debug!("Prover {}: duplicate ack ignored", self.thread_id);
                Ok(self)
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Prover in state {s} cannot handle presentation ack"),
            )),
        }
    }

    pub fn receive_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        match self.state {
            ProverFullState::RequestReceived(_) | ProverFullState::PresentationSent(_) => {
                let reason = problem_report_reason(&problem_report);
                info!("Prover {}: {} -> Rejected ({reason})", self.thread_id, self.state);
                Ok(Self {
                    state: ProverFullState::Rejected(RejectedState {
                        reason,
                        problem_report: None,
                    }),
                    ..self
                })
            }
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Prover in state {s} cannot handle problem report"),
            )),
        }
    }

    pub fn abandon(self, reason: &str) -> Self {
        if matches!(self.state, ProverFullState::Abandoned(_)) {
            return self;
        }
        info!("Prover {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        Self {
            state: ProverFullState::Abandoned(AbandonedState {
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
            ProverFullState::Verified(_) | ProverFullState::Rejected(_) | ProverFullState::Abandoned(_)
        )
    }

    pub fn get_state(&self) -> ProverState {
        match self.state {
            ProverFullState::RequestReceived(_) => ProverState::RequestReceived,
            ProverFullState::PresentationSent(_) => ProverState::PresentationSent,
            ProverFullState::Verified(_) => ProverState::Verified,
            ProverFullState::Rejected(_) => ProverState::Rejected,
            ProverFullState::Abandoned(_) => ProverState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    pub fn get_presentation_msg(&self) -> VcxResult<&PresentationMsg> {
        match &self.state {
            ProverFullState::PresentationSent(state) => Ok(&state.presentation_msg),
            ProverFullState::Verified(state) => Ok(&state.presentation_msg),
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidState,
                format!("Presentation is not available in prover state {s}"),
            )),
        }
    }

    pub fn get_problem_report(&self) -> Option<&ProblemReport> {
        match &self.state {
            ProverFullState::Rejected(state) => state.problem_report.as_ref(),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            ProverFullState::Rejected(state) => Some(&state.reason),
            ProverFullState::Abandoned(state) => Some(&state.reason),
            _ => None,
        }
    }
}
