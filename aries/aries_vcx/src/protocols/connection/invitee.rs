use std::fmt;

use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    decorators::{thread::Thread, timing::Timing},
    msg_fields::protocols::{
        connection::{
            request::{Request, RequestContent, RequestDecorators},
            response::Response,
        },
        notification::ack::Ack,
        report_problem::ProblemReport,
    },
    AriesMessage,
};
use url::Url;
use uuid::Uuid;

use super::{
    invitation::{AnyInvitation, ServiceTarget},
    my_connection_data,
    pairwise_info::PairwiseInfo,
    their_pairwise, TheirPairwise,
};
use crate::{
    common::signing::decode_signed_connection_response,
    errors::error::prelude::*,
    handlers::util::verify_thread_id,
    protocols::common::{build_ack_parts, problem_report_reason},
};

/// Invitee side of the connection protocol. Reuses the invitation `@id` as thread id and as
/// parent thread id of the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviteeSM {
    thread_id: String,
    pairwise_info: PairwiseInfo,
    state: InviteeFullState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviteeState {
    Initial,
    InvitationReceived,
    RequestSent,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InviteeFullState {
    Initial,
    InvitationReceived(InvitationReceivedState),
    RequestSent(RequestSentState),
    Completed(CompletedState),
    Abandoned(AbandonedState),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationReceivedState {
    pub invitation: AnyInvitation,
    pub bootstrap: ServiceTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestSentState {
    pub invitation: AnyInvitation,
    pub bootstrap: ServiceTarget,
    pub request: Request,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedState {
    pub bootstrap: ServiceTarget,
    pub their: TheirPairwise,
    pub ack: Option<Ack>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbandonedState {
    pub reason: String,
    pub bootstrap: Option<ServiceTarget>,
    pub their: Option<TheirPairwise>,
}

impl fmt::Display for InviteeFullState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InviteeFullState::Initial => f.write_str("Initial"),
            InviteeFullState::InvitationReceived(_) => f.write_str("InvitationReceived"),
            InviteeFullState::RequestSent(_) => f.write_str("RequestSent"),
            InviteeFullState::Completed(_) => f.write_str("Completed"),
            InviteeFullState::Abandoned(_) => f.write_str("Abandoned"),
        }
    }
}

impl InviteeSM {
    pub fn new(pairwise_info: PairwiseInfo) -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            pairwise_info,
            state: InviteeFullState::Initial,
        }
    }

    /// Accepts an invitation. Malformed endpoints or keys fail with `InvalidInvitation`.
    pub fn receive_invitation(self, invitation: AnyInvitation) -> VcxResult<Self> {
        trace!("InviteeSM::receive_invitation >>> invitation: {}", invitation.id());
        match self.state {
            InviteeFullState::Initial => {
                let bootstrap = invitation.bootstrap_service()?;
                let thread_id = invitation.id().to_owned();
                info!("Invitee {thread_id}: Initial -> InvitationReceived");
                Ok(Self {
                    thread_id,
                    state: InviteeFullState::InvitationReceived(InvitationReceivedState {
                        invitation,
                        bootstrap,
                    }),
                    ..self
                })
            }
            s => Err(wrong_state("receive invitation", &s)),
        }
    }

    pub fn send_request(
        self,
        label: &str,
        service_endpoint: &Url,
        routing_keys: Vec<String>,
    ) -> VcxResult<Self> {
        match self.state {
            InviteeFullState::InvitationReceived(state) => {
                let connection =
                    my_connection_data(&self.pairwise_info, service_endpoint, routing_keys);
                let content = RequestContent::builder()
                    .label(label.to_owned())
                    .connection(connection)
                    .build();
                let decorators = RequestDecorators::builder()
                    .thread(
                        Thread::builder()
                            .thid(self.thread_id.clone())
                            .pthid(self.thread_id.clone())
                            .build(),
                    )
                    .timing(Timing::now())
                    .build();
                let request = Request::builder()
                    .id(Uuid::new_v4().to_string())
                    .content(content)
                    .decorators(decorators)
                    .build();
                info!("Invitee {}: InvitationReceived -> RequestSent", self.thread_id);
                Ok(Self {
                    state: InviteeFullState::RequestSent(RequestSentState {
                        invitation: state.invitation,
                        bootstrap: state.bootstrap,
                        request,
                    }),
                    ..self
                })
            }
            s => Err(wrong_state("send request", &s)),
        }
    }

    /// Authenticates the response with the invitation key. A bad `connection~sig` is a key
    /// agreement failure.
    pub async fn handle_connection_response(
        self,
        wallet: &dyn BaseWallet,
        response: Response,
    ) -> VcxResult<Self> {
        trace!(
            "InviteeSM::handle_connection_response >>> response: {}, thread: {}",
            response.id,
            self.thread_id
        );
        match self.state {
            InviteeFullState::RequestSent(state) => {
                let message: AriesMessage = response.clone().into();
                verify_thread_id(&self.thread_id, &message)?;

                let please_ack = response.decorators.please_ack.is_some();
                let con_data = decode_signed_connection_response(
                    wallet,
                    response.content,
                    &state.bootstrap.recipient_key,
                )
                .await?;
                let their = their_pairwise(&con_data)?;

                let ack = please_ack.then(|| {
                    let (id, content, decorators) = build_ack_parts(&self.thread_id);
                    Ack::builder()
                        .id(id)
                        .content(content)
                        .decorators(decorators)
                        .build()
                });
                info!(
                    "Invitee {}: RequestSent -> Completed with {}",
                    self.thread_id, their.did
                );
                Ok(Self {
                    state: InviteeFullState::Completed(CompletedState {
                        bootstrap: state.bootstrap,
                        their,
                        ack,
                    }),
                    ..self
                })
            }
            InviteeFullState::Completed(_) => {
                debug!("Invitee {}: duplicate response ignored", self.thread_id);
                Ok(self)
            }
            s => Err(unexpected("connection response", &s)),
        }
    }

    pub fn handle_problem_report(self, problem_report: ProblemReport) -> VcxResult<Self> {
        match self.state {
            InviteeFullState::Completed(_) | InviteeFullState::Abandoned(_) => {
                Err(unexpected("problem report", &self.state))
            }
            _ => {
                let reason = problem_report_reason(&problem_report);
                warn!("Invitee {}: peer reported a problem: {reason}", self.thread_id);
                Ok(self.abandon(&format!("problem report: {reason}")))
            }
        }
    }

    pub fn abandon(self, reason: &str) -> Self {
        let (bootstrap, their) = match self.state {
            InviteeFullState::Abandoned(_) => return self,
            InviteeFullState::Initial => (None, None),
            InviteeFullState::InvitationReceived(ref state) => (Some(state.bootstrap.clone()), None),
            InviteeFullState::RequestSent(ref state) => (Some(state.bootstrap.clone()), None),
            InviteeFullState::Completed(ref state) => {
                (Some(state.bootstrap.clone()), Some(state.their.clone()))
            }
        };
        info!("Invitee {}: {} -> Abandoned ({reason})", self.thread_id, self.state);
        Self {
            state: InviteeFullState::Abandoned(AbandonedState {
                reason: reason.to_owned(),
                bootstrap,
                their,
            }),
            ..self
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn pairwise_info(&self) -> &PairwiseInfo {
        &self.pairwise_info
    }

    pub fn get_state(&self) -> InviteeState {
        match self.state {
            InviteeFullState::Initial => InviteeState::Initial,
            InviteeFullState::InvitationReceived(_) => InviteeState::InvitationReceived,
            InviteeFullState::RequestSent(_) => InviteeState::RequestSent,
            InviteeFullState::Completed(_) => InviteeState::Completed,
            InviteeFullState::Abandoned(_) => InviteeState::Abandoned,
        }
    }

    pub fn state_name(&self) -> String {
        self.state.to_string()
    }

    /// Where messages go before the inviter's pairwise service is known.
    pub fn bootstrap_service(&self) -> Option<&ServiceTarget> {
        match &self.state {
            InviteeFullState::Initial => None,
            InviteeFullState::InvitationReceived(state) => Some(&state.bootstrap),
            InviteeFullState::RequestSent(state) => Some(&state.bootstrap),
            InviteeFullState::Completed(state) => Some(&state.bootstrap),
            InviteeFullState::Abandoned(state) => state.bootstrap.as_ref(),
        }
    }

    pub fn get_request(&self) -> VcxResult<&Request> {
        match &self.state {
            InviteeFullState::RequestSent(state) => Ok(&state.request),
            s => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidState,
                format!("Request is not available in invitee state {s}"),
            )),
        }
    }

    pub fn get_ack(&self) -> Option<&Ack> {
        match &self.state {
            InviteeFullState::Completed(state) => state.ack.as_ref(),
            _ => None,
        }
    }

    pub fn their(&self) -> Option<&TheirPairwise> {
        match &self.state {
            InviteeFullState::Completed(state) => Some(&state.their),
            InviteeFullState::Abandoned(state) => state.their.as_ref(),
            _ => None,
        }
    }

    pub fn abandon_reason(&self) -> Option<&str> {
        match &self.state {
            InviteeFullState::Abandoned(state) => Some(&state.reason),
            _ => None,
        }
    }
}

fn wrong_state(operation: &str, state: &InviteeFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::WrongState,
        format!("Cannot {operation} in invitee state {state}"),
    )
}

fn unexpected(message: &str, state: &InviteeFullState) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::UnexpectedMessage,
        format!("Invitee in state {state} cannot handle {message}"),
    )
}
