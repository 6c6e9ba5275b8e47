use std::fmt;

use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    decorators::{
        please_ack::{AckOn, PleaseAck},
        thread::Thread,
        timing::Timing,
    },
    msg_fields::protocols::{
        connection::{
            request::Request,
            response::{Response, ResponseContent, ResponseDecorators},
        },
        report_problem::ProblemReport,
    },
    AriesMessage,
};
use uuid::Uuid;

use super::{
    invitation::AnyInvitation, my_connection_data, pairwise_info::PairwiseInfo, their_pairwise,
    TheirPairwise,
};
use crate::{
    common::signing::sign_connection_response, errors::error::prelude::*,
    handlers::util::verify_thread_id, protocols::common::problem_report_reason,
};

/// Inviter side of the connection protocol. The thread id is the invitation `@id`; the
/// invitation key only signs the response, all later traffic uses a fresh pairwise key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviterSM {
    thread_id: String,
    invitation_key: PairwiseInfo,
    state: InviterFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviterState {
    Initial,
    InvitationSent,
    RequestReceived,
    Responded,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InviterFullState {
    Initial,
    InvitationSent(InvitationSentState),
    RequestReceived(RequestReceivedState),
    Responded(RespondedState),
    Completed(CompletedState),
    Abandoned(AbandonedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationSentState {
    pub invitation: AnyInvitation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestReceivedState {
    pub invitation: AnyInvitation,
    pub request: Request,
    pub pairwise_info: PairwiseInfo,
    pub their: TheirPairwise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RespondedState {
    pub response: Response,
    pub pairwise_info: PairwiseInfo,
    pub their: TheirPairwise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedState {
    pub pairwise_info: PairwiseInfo,
    pub their: TheirPairwise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedState {
    pub reason: String,
    pub pairwise_info: Option<PairwiseInfo>,
    pub their: Option<TheirPairwise>,
}

impl fmt::Display for InviterFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InviterFullState::Initial => f.write_str("Initial"),
            InviterFullState::InvitationSent(_) => f.write_str("InvitationSent"),
            InviterFullState::RequestReceived(_) => f.write_str("RequestReceived"),
            InviterFullState::Responded(_) => f.write_str("Responded"),
            InviterFullState::Completed(_) => f.write_str("Completed"),
            InviterFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

impl InviterSM {
    pub fn new(invitation_key: PairwiseInfo) -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            invitation_key,
            state: InviterFullState::Initial,
        }
    }

    /// Publishes `invitation`; its `@id` becomes the thread id.
    pub fn send_invitation(self, invitation: AnyInvitation) -> VcxResult<Self> {
        match self.state {
            InviterFullState::Initial => {
                invitation.validate()?;
                let thread_id = invitation.id().to_owned();
                info!("Inviter {thread_id}: Initial -> InvitationSent");
                Ok(Self {
                    thread_id,
                    state: InviterFullState::InvitationSent(InvitationSentState { invitation }),
                    ..self
                })
            }
            s => Err(wrong_state("send invitation", &s)),
        }
    }

    /// Accepts the first request for the invitation. Invitations are single-use, later
    /// requests are rejected.
    /// Fails unless the inviter still waits for its connection request.
    pub fn ensure_awaiting_request(&self) -> VcxResult<()> {
        match &self.state {
            InviterFullState::InvitationSent(_) => Ok(()),
            s => Err(unexpected("connection request", s)),
        }
    }

    pub fn handle_connection_request(
        self,
        request: Request,
        pairwise_info: PairwiseInfo,
    ) -> VcxResult<Self> {
        trace!(
            "InviterSM::handle_connection_request >>> request: {}, thread: {}",
            request.id,
            self.thread_id
        );
        match self.state {
            InviterFullState::InvitationSent(state) => {
                let message: AriesMessage = request.clone().into();
                verify_thread_id(&self.thread_id, &message)?;
                let their = their_pairwise(&request.content.connection)?;
                info!(
                    "Inviter {}: InvitationSent -> RequestReceived from {}",
                    self.thread_id, their.did
                );
                Ok(Self {
                    state: InviterFullState::RequestReceived(RequestReceivedState {
                        invitation: state.invitation,
                        request,
                        pairwise_info,
                        their,
                    }),
                    ..self
                })
            }
            s => Err(unexpected("connection request", &s)),
        }
    }

    /// Signs our pairwise connection data with the invitation key and prepares the response.
    pub async fn send_response(self, wallet: &dyn BaseWallet) -> VcxResult<Self> {
        match self.state {
            InviterFullState::RequestReceived(state) => {
                let service = state.invitation.bootstrap_service()?;
                let con_data = my_connection_data(
                    &state.pairwise_info,
                    &service.service_endpoint,
                    service.routing_keys,
                );
                let connection_sig =
                    sign_connection_response(wallet, &self.invitation_key.pw_vk, &con_data).await?;
                let decorators = ResponseDecorators::builder()
                    .thread(Thread::builder().thid(self.thread_id.clone()).build())
                    .please_ack(PleaseAck::builder().on(vec![AckOn::Outcome]).build())
                    .timing(Timing::now())
                    .build();
                let response = Response::builder()
                    .id(Uuid::new_v4().to_string())
                    .content(
                        ResponseContent::builder()
                            .connection_sig(connection_sig)
                            .build(),
                    )
                    .decorators(decorators)
                    .build();
                info!("Inviter {}: RequestReceived -> Responded", self.thread_id);
                Ok(Self {
                    state: InviterFullState::Responded(RespondedState {
                        response,
                        pairwise_info: state.pairwise_info,
                        their: state.their,
                    }),
                    ..self
                })
            }
            s => Err(wrong_state("send response", &s)),
        }
    }

    pub fn handle_ack(self) -> VcxResult<Self> {
        match self.state {
            InviterFullState::Responded(state) => {
                info!("Inviter {}: Responded -> Completed", self.thread_id);
                Ok(Self {
                    state: InviterFullState::Completed(CompletedState {
                        pairwise_info: state.pairwise_info,
                        their: state.their,
                    }),
                    ..self
                })
            }
            InviterFullState::Completed(_) => {
                debug!("Inviter {}: duplicate ack ignored", self.thread_id);
                Ok(self)
            }
            s => Err(unexpected("ack", &s)),
        }
    }

    /// Any authenticated message from the invitee proves it received the response.
    pub fn complete_by_activity(self) -> VcxResult<Self> {
        match self.state {
            InviterFullState::Responded(_) => self.handle_ack(),
            InviterFullState::Completed(_) => Ok(self),
            s => Err(wrong_state("complete connection", &s)),
        }
    }

    pub fn handle_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        match self.state {
            InviterFullState::Completed(_) | InviterFullState::Abandoned(_) => {
                Err(unexpected("problem report", &self.state))
            }
            _ => {
                let reason = problem_report_reason(&problem_report);
                warn!("Inviter {}: peer reported a problem: {reason}", self.thread_id);
                Ok(self.abandon(&format!("problem report: {reason}")))
            }
        }
    }

    pub fn abandon(self, reason: &str) -> Self {
        let (pairwise_info, their) = match self.state {
            InviterFullState::Abandoned(_) => return self,
            InviterFullState::Initial | InviterFullState::InvitationSent(_) => (None, None),
            InviterFullState::RequestReceived(ref state) => {
                (Some(state.pairwise_info.clone()), Some(state.their.clone()))
            }
            InviterFullState::Responded(ref state) => {
                (Some(state.pairwise_info.clone()), Some(state.their.clone()))
            }
            InviterFullState::Completed(ref state) => {
                (Some(state.pairwise_info.clone()), Some(state.their.clone()))
            }
        };
        info!("Inviter {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        Self {
            state: InviterFullState::Abandoned(AbandonedState {
                reason: reason.to_owned(),
                pairwise_info,
                their,
            }),
            ..self
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn invitation_key(&self) -> &PairwiseInfo {
        &self.invitation_key
    }

    pub fn get_state(&self) -> InviterState {
        match self.state {
            InviterFullState::Initial => InviterState::Initial,
            InviterFullState::InvitationSent(_) => InviterState::InvitationSent,
            InviterFullState::RequestReceived(_) => InviterState::RequestReceived,
            InviterFullState::Responded(_) => InviterState::Responded,
            InviterFullState::Completed(_) => InviterState::Completed,
            InviterFullState::Abandoned(_) => InviterState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    pub fn get_invitation(&self) -> VcxResult<&AnyInvitation> {
        match &self.state {
            InviterFullState::InvitationSent(state) => Ok(&state.invitation),
            InviterFullState::RequestReceived(state) => Ok(&state.invitation),
            s => Err(not_available("Invitation", s)),
        }
    }

    pub fn get_response(&self) -> VcxResult<&Response> {
        match &self.state {
            InviterFullState::Responded(state) => Ok(&state.response),
            s => Err(not_available("Response", s)),
        }
    }

    /// Our pairwise key, once a request was accepted.
    pub fn pairwise_info(&self) -> Option<&PairwiseInfo> {
        match &self.state {
            InviterFullState::RequestReceived(state) => Some(&state.pairwise_info),
            InviterFullState::Responded(state) => Some(&state.pairwise_info),
            InviterFullState::Completed(state) => Some(&state.pairwise_info),
            InviterFullState::Abandoned(state) => state.pairwise_info.as_ref(),
            _ => None,
        }
    }

    pub fn their(&self) -> Option<&TheirPairwise> {
        match &self.state {
            InviterFullState::RequestReceived(state) => Some(&state.their),
            InviterFullState::Responded(state) => Some(&state.their),
            InviterFullState::Completed(state) => Some(&state.their),
            InviterFullState::Abandoned(state) => state.their.as_ref(),
            _ => None,
        }
    }

    pub fn abandon_reason(&self) -> Option<&str> {
        match &self.state {
            InviterFullState::Abandoned(state) => Some(&state.reason),
            _ => None,
        }
    }
}

fn wrong_state(operation: &str, state: &InviterFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::WrongState,
        format!("Cannot {operation} in inviter state {state}"),
    )
}

fn unexpected(message: &str, state: &InviterFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::UnexpectedMessage,
        format!("Inviter in state {state} cannot handle {message}"),
    )
}

fn not_available(what: &str, state: &InviterFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::InvalidState,
        format!("{what} is not available in inviter state {state}"),
    )
}
