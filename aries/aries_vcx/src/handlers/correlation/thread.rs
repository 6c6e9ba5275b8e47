use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use messages::{msg_types::MessageKind, AriesMessage};

use super::pending::PendingExchanges;
use crate::{
    common::credentials::CredentialRecord,
    errors::error::prelude::*,
    global::settings::RetryPolicy,
    protocols::{
        connection::{
            invitation::ServiceTarget,
            invitee::{InviteeSM, InviteeState},
            inviter::{InviterSM, InviterState},
            pairwise_info::PairwiseInfo, ConnectionInfo, TheirPairwise,
        },
        issuance::{holder::HolderSM, issuer::IssuerSM},
        discovery::FeatureQuerier,
        proof_presentation::{prover::ProverSM, verifier::VerifierSM},
        trustping::TrustPingSender,
    },
};

/// Inbound message ids remembered per thread for replay detection.
const APPLIED_IDS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum ProtocolKind {
    Connection,
    Credential,
    Proof,
    TrustPing,
    DiscoverFeatures,
}

/// The state machine driving a thread, tagged by role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ThreadMachine {
    Inviter(InviterSM),
    Invitee(InviteeSM),
    Issuer(IssuerSM),
    Holder(HolderSM),
    Verifier(VerifierSM),
    Prover(ProverSM),
    TrustPing(TrustPingSender),
    FeatureQuery(FeatureQuerier),
}

impl ThreadMachine {
    pub fn protocol(&self) -> ProtocolKind {
        match self {
            Self::Inviter(_) | Self::Invitee(_) => ProtocolKind::Connection,
            Self::Issuer(_) | Self::Holder(_) => ProtocolKind::Credential,
            Self::Verifier(_) | Self::Prover(_) => ProtocolKind::Proof,
            Self::TrustPing(_) => ProtocolKind::TrustPing,
            Self::FeatureQuery(_) => ProtocolKind::DiscoverFeatures,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Inviter(_) => "inviter",
            Self::Invitee(_) => "invitee",
            Self::Issuer(_) => "issuer",
            Self::Holder(_) => "holder",
            Self::Verifier(_) => "verifier",
            Self::Prover(_) => "prover",
            Self::TrustPing(_) => "ping-sender",
            Self::FeatureQuery(_) => "querier",
        }
    }

    pub fn state_name(&self) -> String {
        match self {
            Self::Inviter(sm) => sm.state_name(),
            Self::Invitee(sm) => sm.state_name(),
            Self::Issuer(sm) => sm.state_name(),
            Self::Holder(sm) => sm.state_name(),
            Self::Verifier(sm) => sm.state_name(),
            Self::Prover(sm) => sm.state_name(),
            Self::TrustPing(sm) => format!("{:?}", sm.get_state()),
            Self::FeatureQuery(sm) => format!("{:?}", sm.get_state()),
        }
    }

    /// No further message is expected on a terminal thread.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Inviter(sm) => matches!(
                sm.get_state(),
                InviterState::Completed | InviterState::Abandoned
            ),
            Self::Invitee(sm) => matches!(
                sm.get_state(),
                InviteeState::Completed | InviteeState::Abandoned
            ),
            Self::Issuer(sm) => sm.is_terminal(),
            Self::Holder(sm) => sm.is_terminal(),
            Self::Verifier(sm) => sm.is_terminal(),
            Self::Prover(sm) => sm.is_terminal(),
            Self::TrustPing(sm) => sm.is_terminal(),
            Self::FeatureQuery(sm) => sm.is_terminal(),
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.state_name() == "Abandoned"
    }

    pub fn abandon(self, reason: &str) -> Self {
        match self {
            Self::Inviter(sm) => Self::Inviter(sm.abandon(reason)),
            Self::Invitee(sm) => Self::Invitee(sm.abandon(reason)),
            Self::Issuer(sm) => Self::Issuer(sm.abandon(reason)),
            Self::Holder(sm) => Self::Holder(sm.abandon(reason)),
            Self::Verifier(sm) => Self::Verifier(sm.abandon(reason)),
            Self::Prover(sm) => Self::Prover(sm.abandon(reason)),
            Self::TrustPing(sm) => Self::TrustPing(sm.abandon(reason)),
            Self::FeatureQuery(sm) => Self::FeatureQuery(sm.abandon(reason)),
        }
    }

    /// Key material of a connection thread. `None` for other protocols.
    pub fn connection_snapshot(&self) -> Option<ConnectionSnapshot> {
        match self {
            Self::Inviter(sm) => Some(ConnectionSnapshot {
                thread_id: sm.thread_id().to_owned(),
                my: sm.pairwise_info().cloned(),
                invitation_vk: Some(sm.invitation_key().pw_vk.clone()),
                their: sm.their().cloned(),
                bootstrap: None,
                awaiting_activity: sm.state_name() == "Responded",
                usable: sm.get_state() != InviterState::Abandoned,
            }),
            Self::Invitee(sm) => Some(ConnectionSnapshot {
                thread_id: sm.thread_id().to_owned(),
                my: Some(sm.pairwise_info().clone()),
                invitation_vk: None,
                their: sm.their().cloned(),
                bootstrap: sm.bootstrap_service().cloned(),
                awaiting_activity: false,
                usable: sm.get_state() != InviteeState::Abandoned,
            }),
            _ => None,
        }
    }
}

/// What the engine needs from a connection to route and authenticate traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub thread_id: String,
    pub my: Option<PairwiseInfo>,
    /// Key the invitation was published under; requests arrive encrypted to it.
    pub invitation_vk: Option<String>,
    pub their: Option<TheirPairwise>,
    pub bootstrap: Option<ServiceTarget>,
    /// Inviter waiting for the first authenticated message after its response.
    pub awaiting_activity: bool,
    pub usable: bool,
}

impl ConnectionSnapshot {
    pub fn my_vk(&self) -> Option<&str> {
        self.my.as_ref().map(|my| my.pw_vk.as_str())
    }

    pub fn their_vk(&self) -> Option<&str> {
        self.their.as_ref().map(TheirPairwise::verkey)
    }

    /// Where messages to the peer go: its pairwise service once known, the invitation's
    /// service before that.
    pub fn target(&self) -> VcxResult<&ServiceTarget> {
        self.their
            .as_ref()
            .map(|their| &their.service)
            .or(self.bootstrap.as_ref())
            .ok_or_else(|| {
                AriesVcxError::from_msg(
                    AriesVcxErrorKind::InvalidState,
                    format!("Connection {} has no peer service yet", self.thread_id),
                )
            })
    }

    pub fn is_established(&self) -> bool {
        self.usable && self.my.is_some() && self.their.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadError {
    pub kind: AriesVcxErrorKind,
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&AriesVcxError> for ThreadError {
    fn from(err: &AriesVcxError) -> Self {
        Self {
            kind: err.kind(),
            category: err.category(),
            message: err.msg().to_owned(),
        }
    }
}

/// Last message we sent and the inbound message it answered, for lost-reply recovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastOutbound {
    pub message: AriesMessage,
    pub answers: Option<String>,
}

/// Everything the engine tracks about one protocol instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeThread {
    pub thread_id: String,
    pub machine: ThreadMachine,
    /// Connection thread carrying this exchange. Connection threads carry themselves.
    pub connection_id: Option<String>,
    /// Credential threads only: our signing identity when issuing, the offering party's
    /// when holding.
    pub issuer: Option<PairwiseInfo>,
    pub policy: RetryPolicy,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_error: Option<ThreadError>,
    pub pending: PendingExchanges,
    pub last_outbound: Option<LastOutbound>,
    applied_ids: VecDeque<String>,
}

impl ExchangeThread {
    pub fn new(
        thread_id: String,
        machine: ThreadMachine,
        connection_id: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            machine,
            connection_id,
            issuer: None,
            policy,
            created_at: now,
            last_activity: now,
            last_error: None,
            pending: PendingExchanges::default(),
            last_outbound: None,
            applied_ids: VecDeque::new(),
        }
    }

    pub fn with_issuer(mut self, issuer: PairwiseInfo) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn protocol(&self) -> ProtocolKind {
        self.machine.protocol()
    }

    pub fn was_applied(&self, message_id: &str) -> bool {
        self.applied_ids.iter().any(|id| id == message_id)
    }

    pub fn mark_applied(&mut self, message_id: &str) {
        if self.applied_ids.len() == APPLIED_IDS_CAPACITY {
            self.applied_ids.pop_front();
        }
        self.applied_ids.push_back(message_id.to_owned());
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn record_error(&mut self, err: &AriesVcxError) {
        self.last_error = Some(ThreadError::from(err));
    }

    /// Replaces the machine with its abandoned form; no reply is awaited afterwards.
    pub fn abandon(&mut self, reason: &str) {
        self.machine = self.machine.clone().abandon(reason);
        self.pending.clear();
        self.touch();
    }

    pub fn status(&self) -> ThreadStatus {
        ThreadStatus {
            thread_id: self.thread_id.clone(),
            protocol: self.protocol(),
            role: self.machine.role().to_owned(),
            state: self.machine.state_name(),
            connection_id: self.connection_id.clone(),
            pending: self.pending.expected_kinds(),
            last_error: self.last_error.clone(),
            terminal: self.machine.is_terminal(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }

    pub fn connection_info(&self) -> VcxResult<ConnectionInfo> {
        let snapshot = self.machine.connection_snapshot().ok_or_else(|| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("Thread {} is not a connection", self.thread_id),
            )
        })?;
        let my = snapshot.my.unwrap_or_default();
        Ok(ConnectionInfo {
            thread_id: self.thread_id.clone(),
            state: self.machine.state_name(),
            my_did: my.pw_did,
            my_vk: my.pw_vk,
            their: snapshot.their,
        })
    }

    /// Finalized credential held through this thread.
    pub fn held_credential(&self) -> Option<&CredentialRecord> {
        match &self.machine {
            ThreadMachine::Holder(sm) => sm.record().filter(|record| record.finalized),
            _ => None,
        }
    }
}

/// Caller-facing view of a thread: its state plus the last failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadStatus {
    pub thread_id: String,
    pub protocol: ProtocolKind,
    pub role: String,
    pub state: String,
    pub connection_id: Option<String>,
    pub pending: Vec<MessageKind>,
    pub last_error: Option<ThreadError>,
    #[serde(default)]
    pub terminal: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ThreadStatus {
    /// No further message is expected on a terminal thread.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_abandoned(&self) -> bool {
        self.state == "Abandoned"
    }
}
