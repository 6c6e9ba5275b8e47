use std::sync::{Arc, RwLock};

use anoncreds_types::data_types::{
    credential::Credential, messages::cred_offer::CredentialOffer,
    pres_request::PresentationRequestPayload,
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use chrono::{DateTime, Utc};
use messages::{
    decorators::attachment::decode_first,
    msg_fields::protocols::{
        basic_message::BasicMessage,
        connection::{invitation::Invitation, Connection},
        cred_issuance::{offer_credential::OfferCredential, CredentialIssuance},
        discover_features::{DiscoverFeatures, ProtocolDescriptor},
        notification::Notification,
        out_of_band::{invitation::OobInvitation, HANDSHAKE_CONNECTIONS_V1},
        present_proof::{ack::AckPresentation, request::RequestPresentation, PresentProof},
        trust_ping::{ping::Ping, TrustPing},
    },
    msg_types::MessageKind,
    AriesMessage,
};

use super::{
    registry::{ThreadRegistry, ThreadSlot},
    thread::{ConnectionSnapshot, ExchangeThread, LastOutbound, ThreadMachine, ThreadStatus},
};
use crate::{
    common::{credentials::CredentialRecord, ledger::resolve_schema},
    errors::error::prelude::*,
    global::settings::AgentConfig,
    protocols::{
        basic_message::{build_basic_message, ReceivedMessage},
        common::problem_report_reason,
        connection::{
            invitation::{build_invitation, AnyInvitation},
            invitee::InviteeSM,
            inviter::InviterSM,
            pairwise_info::PairwiseInfo,
            ConnectionInfo,
        },
        issuance::{
            holder::{HolderSM, HolderState},
            issuer::{IssuerKeys, IssuerSM, OfferInfo},
        },
        discovery::{build_disclose, FeatureQuerier},
        oob::{OutOfBandReceiver, OutOfBandSender},
        proof_presentation::{
            prover::ProverSM,
            verifier::{VerifierSM, VerifierState},
        },
        trustping::{build_ping_response, TrustPingSender},
    },
    transport::Transport,
    utils::encryption_envelope::{check_sender, EncryptionEnvelope, UnpackedMessage},
};

/// What drives a transition: a received message or a local decision.
#[derive(Debug)]
enum Action {
    Inbound(AriesMessage),
    /// Sends the opening message of a thread created locally.
    Open,
    SendRequest,
    /// An authenticated message from the invitee arrived on another thread.
    Activity,
    OfferCredential(OfferInfo),
    RequestCredential,
    DeclineOffer(String),
    PresentProof,
    DeclinePresentationRequest(String),
}

struct Outbound {
    message: AriesMessage,
    expects: Option<MessageKind>,
}

/// Result of running an action against a machine: the new machine and what to send.
struct Step {
    machine: ThreadMachine,
    outbound: Option<Outbound>,
}

impl Step {
    fn silent(machine: ThreadMachine) -> Self {
        Self {
            machine,
            outbound: None,
        }
    }

    fn send(machine: ThreadMachine, message: AriesMessage) -> Self {
        Self {
            machine,
            outbound: Some(Outbound {
                message,
                expects: None,
            }),
        }
    }

    fn expect(machine: ThreadMachine, message: AriesMessage, expects: MessageKind) -> Self {
        Self {
            machine,
            outbound: Some(Outbound {
                message,
                expects: Some(expects),
            }),
        }
    }

    fn answer_ping(machine: ThreadMachine, ping: &Ping) -> Self {
        if ping.content.response_requested {
            Self::send(machine, build_ping_response(ping).into())
        } else {
            Self::silent(machine)
        }
    }
}

enum Transition {
    Applied(String),
    Replayed { resent: bool },
}

/// What became of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The message moved its thread to `state`.
    Applied { thread_id: String, state: String },
    /// The message was seen before. `resent` tells whether our answer to it went out again.
    Replayed { thread_id: String, resent: bool },
    /// The message opened a new thread waiting for a local decision.
    Opened { thread_id: String },
}

impl InboundOutcome {
    fn from_transition(thread_id: String, transition: Transition) -> Self {
        match transition {
            Transition::Applied(state) => Self::Applied { thread_id, state },
            Transition::Replayed { resent } => Self::Replayed { thread_id, resent },
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            Self::Applied { thread_id, .. }
            | Self::Replayed { thread_id, .. }
            | Self::Opened { thread_id } => thread_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutReport {
    pub resent: Vec<String>,
    pub abandoned: Vec<String>,
}

impl TimeoutReport {
    pub fn is_empty(&self) -> bool {
        self.resent.is_empty() && self.abandoned.is_empty()
    }
}

/// Owns every exchange thread of the agent. Each thread is mutated only under its own lock;
/// a transition never holds more than one thread lock at a time.
#[derive(Debug)]
pub struct ExchangeEngine {
    config: AgentConfig,
    wallet: Arc<dyn BaseWallet>,
    ledger: Arc<dyn AnoncredsLedgerRead>,
    transport: Arc<dyn Transport>,
    registry: ThreadRegistry,
    credentials: RwLock<Vec<CredentialRecord>>,
    messages: RwLock<Vec<ReceivedMessage>>,
}

impl ExchangeEngine {
    pub fn new(
        config: AgentConfig,
        wallet: Arc<dyn BaseWallet>,
        ledger: Arc<dyn AnoncredsLedgerRead>,
        transport: Arc<dyn Transport>,
    ) -> VcxResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            wallet,
            ledger,
            transport,
            registry: ThreadRegistry::new(),
            credentials: RwLock::new(Vec::new()),
            messages: RwLock::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // Connections

    /// Creates a single-use connection invitation. Its `@id` is the connection id.
    pub async fn create_invitation(&self) -> VcxResult<(String, Invitation)> {
        let invitation_key = PairwiseInfo::create(self.wallet.as_ref()).await?;
        let invitation = build_invitation(
            &invitation_key,
            &self.config.label,
            &self.config.service_endpoint,
            self.config.routing_keys.clone(),
        );
        let sm = InviterSM::new(invitation_key)
            .send_invitation(AnyInvitation::Con(invitation.clone()))?;
        let connection_id = self.register(ExchangeThread::new(
            sm.thread_id().to_owned(),
            ThreadMachine::Inviter(sm),
            None,
            self.config.retry_policy(),
        ))?;
        info!("Created invitation {connection_id}");
        Ok((connection_id, invitation))
    }

    pub async fn receive_invitation(&self, invitation: AnyInvitation) -> VcxResult<String> {
        invitation.validate()?;
        let pairwise_info = PairwiseInfo::create(self.wallet.as_ref()).await?;
        let sm = InviteeSM::new(pairwise_info).receive_invitation(invitation)?;
        let connection_id = self.register(ExchangeThread::new(
            sm.thread_id().to_owned(),
            ThreadMachine::Invitee(sm),
            None,
            self.config.retry_policy(),
        ))?;
        info!("Received invitation {connection_id}");
        Ok(connection_id)
    }

    pub async fn send_request(&self, connection_id: &str) -> VcxResult<()> {
        self.run_action(connection_id, Action::SendRequest).await?;
        Ok(())
    }

    /// Receives the invitation and answers it with a connection request.
    pub async fn accept_invitation(&self, invitation: AnyInvitation) -> VcxResult<String> {
        let connection_id = self.receive_invitation(invitation).await?;
        self.send_request(&connection_id).await?;
        Ok(connection_id)
    }

    pub async fn connection_info(&self, connection_id: &str) -> VcxResult<ConnectionInfo> {
        let slot = self.registry.get_existing(connection_id)?;
        let thread = slot.lock().await;
        thread.connection_info()
    }

    // Out-of-band

    /// Creates an out-of-band invitation with a connection handshake. Offers and
    /// presentation requests are attached and bound to the connection it bootstraps;
    /// they are answered once the invitee has connected.
    pub async fn create_oob_invitation(
        &self,
        offers: Vec<OfferInfo>,
        proof_requests: Vec<PresentationRequestPayload>,
    ) -> VcxResult<(String, OobInvitation)> {
        let invitation_key = PairwiseInfo::create(self.wallet.as_ref()).await?;
        let mut sender = OutOfBandSender::create()
            .set_label(&self.config.label)
            .append_service(
                &invitation_key,
                &self.config.service_endpoint,
                self.config.routing_keys.clone(),
            )
            .append_handshake_protocol(HANDSHAKE_CONNECTIONS_V1)?;
        let connection_id = sender.get_id().to_owned();
        let policy = self.config.retry_policy();

        let mut attached = Vec::new();
        for offer_info in offers {
            let schema = resolve_schema(
                self.ledger.as_ref(),
                &self.config.ledger_retry_policy(),
                &offer_info.schema_id,
            )
            .await?;
            let sm = IssuerSM::new().build_offer(&schema, offer_info, &invitation_key.pw_did)?;
            sender = sender.append_a2a_message(sm.get_offer()?.clone().into())?;
            attached.push(
                ExchangeThread::new(
                    sm.thread_id().to_owned(),
                    ThreadMachine::Issuer(sm),
                    Some(connection_id.clone()),
                    policy,
                )
                .with_issuer(invitation_key.clone()),
            );
        }
        for request in proof_requests {
            let sm = VerifierSM::create_request(request, None)?;
            sender = sender.append_a2a_message(sm.get_request_msg()?.clone().into())?;
            attached.push(ExchangeThread::new(
                sm.thread_id().to_owned(),
                ThreadMachine::Verifier(sm),
                Some(connection_id.clone()),
                policy,
            ));
        }

        let oob = sender.oob;
        let sm = InviterSM::new(invitation_key).send_invitation(AnyInvitation::Oob(oob.clone()))?;
        self.register(ExchangeThread::new(
            connection_id.clone(),
            ThreadMachine::Inviter(sm),
            None,
            policy,
        ))?;
        for thread in attached {
            self.register(thread)?;
        }
        info!(
            "Created out-of-band invitation {connection_id} with {} attachment(s)",
            oob.content.requests_attach.as_ref().map_or(0, Vec::len)
        );
        Ok((connection_id, oob))
    }

    /// Accepts an out-of-band invitation. Returns the connection it started, if it asked
    /// for a handshake, and the attached requests to hand to `process_attached_message`
    /// once that connection is complete.
    pub async fn receive_oob_invitation(
        &self,
        invitation: OobInvitation,
    ) -> VcxResult<(Option<String>, Vec<AriesMessage>)> {
        let receiver = OutOfBandReceiver { oob: invitation };
        let attached = receiver.extract_a2a_messages()?;
        let connection_id = match receiver.connection_invitation() {
            Some(invitation) => Some(self.accept_invitation(invitation).await?),
            None => None,
        };
        Ok((connection_id, attached))
    }

    pub async fn receive_oob_url(
        &self,
        url: &str,
    ) -> VcxResult<(Option<String>, Vec<AriesMessage>)> {
        let receiver = OutOfBandReceiver::create_from_url(url)?;
        self.receive_oob_invitation(receiver.oob).await
    }

    /// Opens a holder or prover thread for a request that came attached to an out-of-band
    /// invitation. Attached offers are signed with the key the invitation was published under.
    pub async fn process_attached_message(
        &self,
        connection_id: &str,
        message: AriesMessage,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        match message {
            AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential(offer)) => {
                let issuer_vk = match (&connection.bootstrap, connection.their_vk()) {
                    (Some(bootstrap), _) => bootstrap.recipient_key.clone(),
                    (None, Some(their_vk)) => their_vk.to_owned(),
                    (None, None) => return Err(not_established(connection_id)),
                };
                self.open_holder(&connection, offer, &issuer_vk)
            }
            AriesMessage::PresentProof(PresentProof::RequestPresentation(request)) => {
                self.open_prover(&connection, request)
            }
            message => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("{} cannot be attached to an invitation", message.kind()),
            )),
        }
    }

    // Issuance

    /// Offers a credential on an established connection. Returns the new thread id.
    pub async fn offer_credential(
        &self,
        connection_id: &str,
        offer_info: OfferInfo,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        let issuer = connection
            .my
            .clone()
            .ok_or_else(|| not_established(connection_id))?;
        let sm = IssuerSM::new();
        let thread = ExchangeThread::new(
            sm.thread_id().to_owned(),
            ThreadMachine::Issuer(sm),
            Some(connection_id.to_owned()),
            self.config.retry_policy(),
        )
        .with_issuer(issuer);
        let thread_id = thread.thread_id.clone();
        let slot = self.registry.insert(thread)?;
        self.transition(&slot, Action::OfferCredential(offer_info), Some(&connection))
            .await?;
        Ok(thread_id)
    }

    pub async fn request_credential(&self, thread_id: &str) -> VcxResult<()> {
        self.run_action(thread_id, Action::RequestCredential).await?;
        Ok(())
    }

    pub async fn decline_offer(&self, thread_id: &str, reason: &str) -> VcxResult<()> {
        self.run_action(thread_id, Action::DeclineOffer(reason.to_owned()))
            .await?;
        Ok(())
    }

    /// Finalized credentials held by this agent.
    pub fn credentials(&self) -> VcxResult<Vec<CredentialRecord>> {
        let credentials = self.credentials.read().map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock credential store: {err}"),
            )
        })?;
        Ok(credentials.clone())
    }

    fn usable_credentials(&self) -> VcxResult<Vec<Credential>> {
        Ok(self
            .credentials()?
            .iter()
            .filter_map(CredentialRecord::usable_credential)
            .cloned()
            .collect())
    }

    fn store_credential(&self, record: &CredentialRecord) {
        match self.credentials.write() {
            Ok(mut credentials) => {
                if !credentials
                    .iter()
                    .any(|held| held.thread_id == record.thread_id)
                {
                    info!("Storing credential of thread {}", record.thread_id);
                    credentials.push(record.clone());
                }
            }
            Err(err) => error!("Unable to lock credential store: {err}"),
        }
    }

    // Proof presentation

    pub async fn request_proof(
        &self,
        connection_id: &str,
        request: PresentationRequestPayload,
        comment: Option<String>,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        let sm = VerifierSM::create_request(request, comment)?;
        let thread_id = sm.thread_id().to_owned();
        let slot = self.registry.insert(ExchangeThread::new(
            thread_id.clone(),
            ThreadMachine::Verifier(sm),
            Some(connection_id.to_owned()),
            self.config.retry_policy(),
        ))?;
        self.transition(&slot, Action::Open, Some(&connection)).await?;
        Ok(thread_id)
    }

    /// Presents from the stored credentials. `NoMatchingCredential` leaves the thread open
    /// for `decline_presentation_request`.
    pub async fn present_proof(&self, thread_id: &str) -> VcxResult<()> {
        self.run_action(thread_id, Action::PresentProof).await?;
        Ok(())
    }

    pub async fn decline_presentation_request(
        &self,
        thread_id: &str,
        reason: &str,
    ) -> VcxResult<()> {
        self.run_action(
            thread_id,
            Action::DeclinePresentationRequest(reason.to_owned()),
        )
        .await?;
        Ok(())
    }

    // Trust ping

    pub async fn send_ping(
        &self,
        connection_id: &str,
        comment: Option<String>,
        response_requested: bool,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        let sm = TrustPingSender::build(response_requested, comment);
        let thread_id = sm.get_thread_id().to_owned();
        let slot = self.registry.insert(ExchangeThread::new(
            thread_id.clone(),
            ThreadMachine::TrustPing(sm),
            Some(connection_id.to_owned()),
            self.config.retry_policy(),
        ))?;
        self.transition(&slot, Action::Open, Some(&connection)).await?;
        Ok(thread_id)
    }

    // Feature discovery

    /// Asks the peer which protocols it supports. `query` is a protocol URI prefix ending
    /// in `*`, every protocol when absent.
    pub async fn send_discovery_features(
        &self,
        connection_id: &str,
        query: Option<String>,
        comment: Option<String>,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        let sm = FeatureQuerier::build(query, comment);
        let thread_id = sm.get_thread_id().to_owned();
        let slot = self.registry.insert(ExchangeThread::new(
            thread_id.clone(),
            ThreadMachine::FeatureQuery(sm),
            Some(connection_id.to_owned()),
            self.config.retry_policy(),
        ))?;
        self.transition(&slot, Action::Open, Some(&connection)).await?;
        Ok(thread_id)
    }

    /// Protocols disclosed in answer to a feature query.
    pub async fn disclosed_protocols(
        &self,
        thread_id: &str,
    ) -> VcxResult<Vec<ProtocolDescriptor>> {
        let slot = self.registry.get_existing(thread_id)?;
        let thread = slot.lock().await;
        match &thread.machine {
            ThreadMachine::FeatureQuery(sm) => Ok(sm.protocols().to_vec()),
            machine => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("Thread {thread_id} is a {} thread", machine.protocol()),
            )),
        }
    }

    // Basic messages

    /// Sends `content` as a basic message. Returns the message id.
    pub async fn send_generic_message(
        &self,
        connection_id: &str,
        content: &str,
    ) -> VcxResult<String> {
        let connection = self.established_connection(connection_id).await?;
        let message: AriesMessage = build_basic_message(content).into();
        let message_id = message.id().to_owned();
        self.try_deliver(&connection, &message).await?;
        debug!("Basic message {message_id} sent on connection {connection_id}");
        Ok(message_id)
    }

    /// Basic messages received on a connection, in arrival order.
    pub fn received_messages(&self, connection_id: &str) -> VcxResult<Vec<ReceivedMessage>> {
        let messages = self.messages.read().map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::LockError,
                format!("Unable to lock message store: {err}"),
            )
        })?;
        Ok(messages
            .iter()
            .filter(|message| message.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn receive_basic_message(
        &self,
        message: BasicMessage,
        recipient_vk: &str,
        sender_vk: Option<&str>,
    ) -> VcxResult<InboundOutcome> {
        let connection = self.connection_for_recipient(recipient_vk, sender_vk).await?;
        let slot = self.registry.get_existing(&connection.thread_id)?;
        let record = ReceivedMessage::new(&connection.thread_id, &message);
        let transition = self.transition(&slot, Action::Inbound(message.into()), None).await?;
        if matches!(transition, Transition::Applied(_)) {
            match self.messages.write() {
                Ok(mut messages) => messages.push(record),
                Err(err) => error!("Unable to lock message store: {err}"),
            }
        }
        Ok(InboundOutcome::from_transition(
            connection.thread_id,
            transition,
        ))
    }

    // Inbound

    pub async fn unpack(&self, packed: &[u8]) -> VcxResult<UnpackedMessage> {
        EncryptionEnvelope::unpack_aries_msg(self.wallet.as_ref(), packed).await
    }

    pub async fn receive_packed(&self, packed: &[u8]) -> VcxResult<InboundOutcome> {
        let unpacked = self.unpack(packed).await?;
        self.receive_message(unpacked).await
    }

    /// Routes a decrypted message to its thread by `~thread.thid`. Offers and presentation
    /// requests may open a thread. Pings, feature queries and basic messages go to the
    /// connection they arrived on. Anything else must match a known thread.
    pub async fn receive_message(&self, unpacked: UnpackedMessage) -> VcxResult<InboundOutcome> {
        let UnpackedMessage {
            message,
            sender_vk,
            recipient_vk,
        } = unpacked;
        let thread_id = message.thread_id().to_owned();
        debug!(
            "Received {} {} on thread {thread_id} for {recipient_vk}",
            message.kind(),
            message.id()
        );

        // Basic messages belong to the connection whatever thread they reference.
        let message = match message {
            AriesMessage::BasicMessage(message) => {
                return self
                    .receive_basic_message(message, &recipient_vk, sender_vk.as_deref())
                    .await
            }
            message => message,
        };

        if let Some(slot) = self.registry.get(&thread_id)? {
            return self
                .receive_on_thread(&slot, message, sender_vk.as_deref())
                .await;
        }

        match message {
            AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential(offer)) => {
                let connection = self
                    .connection_for_recipient(&recipient_vk, sender_vk.as_deref())
                    .await?;
                let issuer_vk = connection
                    .their_vk()
                    .ok_or_else(|| not_established(&connection.thread_id))?
                    .to_owned();
                let thread_id = self.open_holder(&connection, offer, &issuer_vk)?;
                Ok(InboundOutcome::Opened { thread_id })
            }
            AriesMessage::PresentProof(PresentProof::RequestPresentation(request)) => {
                let connection = self
                    .connection_for_recipient(&recipient_vk, sender_vk.as_deref())
                    .await?;
                let thread_id = self.open_prover(&connection, request)?;
                Ok(InboundOutcome::Opened { thread_id })
            }
            message @ (AriesMessage::TrustPing(TrustPing::Ping(_))
            | AriesMessage::DiscoverFeatures(DiscoverFeatures::Query(_))) => {
                let connection = self
                    .connection_for_recipient(&recipient_vk, sender_vk.as_deref())
                    .await?;
                let slot = self.registry.get_existing(&connection.thread_id)?;
                let transition = self.transition(&slot, Action::Inbound(message), None).await?;
                Ok(InboundOutcome::from_transition(
                    connection.thread_id,
                    transition,
                ))
            }
            message => {
                warn!(
                    "Dropping {} {}: no thread {thread_id}",
                    message.kind(),
                    message.id()
                );
                Err(AriesVcxError::from_msg(
                    AriesVcxErrorKind::ThreadMismatch,
                    format!(
                        "{} {} does not belong to any known thread",
                        message.kind(),
                        message.id()
                    ),
                ))
            }
        }
    }

    async fn receive_on_thread(
        &self,
        slot: &ThreadSlot,
        message: AriesMessage,
        sender_vk: Option<&str>,
    ) -> VcxResult<InboundOutcome> {
        let (thread_id, connection_id, own) = {
            let thread = slot.lock().await;
            (
                thread.thread_id.clone(),
                thread.connection_id.clone(),
                thread.machine.connection_snapshot(),
            )
        };
        let connection = match &connection_id {
            Some(connection_id) => Some(self.connection_snapshot(connection_id).await?),
            None => None,
        };

        // Requests and responses authenticate through the invitation, not the envelope.
        let expected_sender = match (&own, &connection) {
            (Some(_), _)
                if matches!(
                    message.kind(),
                    MessageKind::ConnectionRequest | MessageKind::ConnectionResponse
                ) =>
            {
                None
            }
            (Some(own), _) => own.their_vk().map(str::to_owned),
            (None, Some(connection)) => Some(
                connection
                    .their_vk()
                    .ok_or_else(|| not_established(&connection.thread_id))?
                    .to_owned(),
            ),
            (None, None) => None,
        };
        if let Some(expected) = expected_sender {
            if let Err(err) = check_sender(sender_vk, &expected) {
                self.abandon_on_error(slot, &err).await;
                return Err(err);
            }
        }

        let transition = self
            .transition(slot, Action::Inbound(message), connection.as_ref())
            .await?;
        if let Some(connection) = connection.filter(|connection| connection.awaiting_activity) {
            self.complete_by_activity(&connection.thread_id).await;
        }
        Ok(InboundOutcome::from_transition(thread_id, transition))
    }

    /// The established connection owning `recipient_vk`, after checking that `sender_vk`
    /// is its peer.
    async fn connection_for_recipient(
        &self,
        recipient_vk: &str,
        sender_vk: Option<&str>,
    ) -> VcxResult<ConnectionSnapshot> {
        let connection_id = self
            .registry
            .connection_for_key(recipient_vk)?
            .ok_or_else(|| {
                AriesVcxError::from_msg(
                    AriesVcxErrorKind::ThreadMismatch,
                    format!("No connection uses key {recipient_vk}"),
                )
            })?;
        let connection = self.established_connection(&connection_id).await?;
        let their_vk = connection
            .their_vk()
            .ok_or_else(|| not_established(&connection_id))?;
        check_sender(sender_vk, their_vk)?;
        if connection.awaiting_activity {
            self.complete_by_activity(&connection_id).await;
        }
        Ok(connection)
    }

    async fn complete_by_activity(&self, connection_id: &str) {
        let result = match self.registry.get_existing(connection_id) {
            Ok(slot) => self.transition(&slot, Action::Activity, None).await.map(drop),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!("Connection {connection_id} could not be completed by activity: {err}");
        }
    }

    fn open_holder(
        &self,
        connection: &ConnectionSnapshot,
        offer: OfferCredential,
        issuer_vk: &str,
    ) -> VcxResult<String> {
        let credential_offer: CredentialOffer = decode_first(&offer.content.offers_attach)?;
        let message_id = offer.id.clone();
        let sm = HolderSM::from_offer(offer)?;
        let mut thread = ExchangeThread::new(
            sm.thread_id().to_owned(),
            ThreadMachine::Holder(sm),
            Some(connection.thread_id.clone()),
            self.config.retry_policy(),
        )
        .with_issuer(PairwiseInfo {
            pw_did: credential_offer.issuer_did,
            pw_vk: issuer_vk.to_owned(),
        });
        thread.mark_applied(&message_id);
        let thread_id = self.register(thread)?;
        info!(
            "Credential offer received on connection {}, thread {thread_id}",
            connection.thread_id
        );
        Ok(thread_id)
    }

    fn open_prover(
        &self,
        connection: &ConnectionSnapshot,
        request: RequestPresentation,
    ) -> VcxResult<String> {
        let message_id = request.id.clone();
        let sm = ProverSM::from_request(request)?;
        let mut thread = ExchangeThread::new(
            sm.thread_id().to_owned(),
            ThreadMachine::Prover(sm),
            Some(connection.thread_id.clone()),
            self.config.retry_policy(),
        );
        thread.mark_applied(&message_id);
        let thread_id = self.register(thread)?;
        info!(
            "Presentation request received on connection {}, thread {thread_id}",
            connection.thread_id
        );
        Ok(thread_id)
    }

    // Timeouts and cancellation

    /// Re-sends every expired pending exchange that has retries left and abandons the
    /// threads that have none.
    pub async fn check_timeouts(&self, now: DateTime<Utc>) -> VcxResult<TimeoutReport> {
        let mut report = TimeoutReport::default();
        for slot in self.registry.slots()? {
            let (message, own, connection_id) = {
                let mut thread = slot.lock().await;
                let thread_id = thread.thread_id.clone();
                let policy = thread.policy;
                let Some(head) = thread.pending.expired_head(now) else {
                    continue;
                };
                let expected = head.expected;
                if head.retries < policy.max_retries {
                    head.retries += 1;
                    head.deadline = now + policy.reply_timeout();
                    info!(
                        "Thread {thread_id}: no {expected} yet, re-sending (retry {}/{})",
                        head.retries, policy.max_retries
                    );
                    let message = head.outbound.clone();
                    report.resent.push(thread_id);
                    (
                        message,
                        thread.machine.connection_snapshot(),
                        thread.connection_id.clone(),
                    )
                } else {
                    let err = AriesVcxError::from_msg(
                        AriesVcxErrorKind::ExchangeTimedOut,
                        format!(
                            "No {expected} received after {} attempt(s)",
                            policy.max_retries + 1
                        ),
                    );
                    error!("Thread {thread_id}: {}", err.msg());
                    slot.bump_generation();
                    thread.abandon(&format!("{:?}", err.kind()));
                    thread.record_error(&err);
                    report.abandoned.push(thread_id);
                    continue;
                }
            };
            let route = match (own, connection_id) {
                (Some(own), _) => Some(own),
                (None, Some(connection_id)) => self.connection_snapshot(&connection_id).await.ok(),
                (None, None) => None,
            };
            match route {
                Some(route) => self.deliver(&route, &message).await,
                None => warn!("No route to re-send {} {}", message.kind(), message.id()),
            }
        }
        Ok(report)
    }

    /// Abandons a thread whatever its state, winning over any transition in flight.
    pub async fn abandon(&self, thread_id: &str, reason: &str) -> VcxResult<ThreadStatus> {
        let slot = self.registry.get_existing(thread_id)?;
        slot.bump_generation();
        let mut thread = slot.lock().await;
        if thread.machine.is_abandoned() {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Thread {thread_id} is already abandoned"),
            ));
        }
        thread.abandon(reason);
        info!("Thread {thread_id} abandoned: {reason}");
        Ok(thread.status())
    }

    async fn abandon_on_error(&self, slot: &ThreadSlot, err: &AriesVcxError) {
        slot.bump_generation();
        let mut thread = slot.lock().await;
        error!("Thread {} abandoned: {}", thread.thread_id, err.msg());
        thread.abandon(&format!("{:?}", err.kind()));
        thread.record_error(err);
    }

    // Introspection and persistence

    pub async fn thread_status(&self, thread_id: &str) -> VcxResult<ThreadStatus> {
        let slot = self.registry.get_existing(thread_id)?;
        let thread = slot.lock().await;
        Ok(thread.status())
    }

    /// All threads, oldest first.
    pub async fn threads(&self) -> VcxResult<Vec<ThreadStatus>> {
        let mut statuses = Vec::new();
        for slot in self.registry.slots()? {
            statuses.push(slot.lock().await.status());
        }
        statuses.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        Ok(statuses)
    }

    pub async fn export_thread(&self, thread_id: &str) -> VcxResult<String> {
        let slot = self.registry.get_existing(thread_id)?;
        let thread = slot.lock().await;
        Ok(serde_json::to_string(&*thread)?)
    }

    pub fn import_thread(&self, exported: &str) -> VcxResult<String> {
        let thread: ExchangeThread = serde_json::from_str(exported)?;
        if let Some(record) = thread.held_credential() {
            self.store_credential(record);
        }
        self.register(thread)
    }

    // Transition machinery

    fn register(&self, thread: ExchangeThread) -> VcxResult<String> {
        let thread_id = thread.thread_id.clone();
        self.index_connection_key(&thread);
        self.registry.insert(thread)?;
        Ok(thread_id)
    }

    fn index_connection_key(&self, thread: &ExchangeThread) {
        let Some(snapshot) = thread.machine.connection_snapshot() else {
            return;
        };
        if let Some(my_vk) = snapshot.my_vk() {
            if let Err(err) = self.registry.bind_connection_key(my_vk, &thread.thread_id) {
                error!("Cannot index key of connection {}: {err}", thread.thread_id);
            }
        }
    }

    async fn connection_snapshot(&self, connection_id: &str) -> VcxResult<ConnectionSnapshot> {
        let slot = self.registry.get_existing(connection_id)?;
        let thread = slot.lock().await;
        thread.machine.connection_snapshot().ok_or_else(|| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidInput,
                format!("Thread {connection_id} is not a connection"),
            )
        })
    }

    async fn established_connection(&self, connection_id: &str) -> VcxResult<ConnectionSnapshot> {
        let connection = self.connection_snapshot(connection_id).await?;
        if !connection.is_established() {
            return Err(not_established(connection_id));
        }
        Ok(connection)
    }

    async fn run_action(&self, thread_id: &str, action: Action) -> VcxResult<String> {
        let slot = self.registry.get_existing(thread_id)?;
        let connection_id = slot.lock().await.connection_id.clone();
        let connection = match connection_id {
            Some(connection_id) => Some(self.connection_snapshot(&connection_id).await?),
            None => None,
        };
        match self.transition(&slot, action, connection.as_ref()).await? {
            Transition::Applied(state) => Ok(state),
            Transition::Replayed { .. } => Ok(slot.lock().await.machine.state_name()),
        }
    }

    /// Runs `action` on the thread under its lock and commits the outcome. Failures are
    /// handled by category: validation leaves no trace, state failures are recorded, the
    /// rest abandon the thread.
    async fn transition(
        &self,
        slot: &ThreadSlot,
        action: Action,
        connection: Option<&ConnectionSnapshot>,
    ) -> VcxResult<Transition> {
        let mut thread = slot.lock().await;
        let generation = slot.generation();
        let inbound = match &action {
            Action::Inbound(message) => Some((message.id().to_owned(), message.kind())),
            _ => None,
        };

        if let Some((message_id, kind)) = &inbound {
            if thread.was_applied(message_id) {
                debug!(
                    "Thread {}: {kind} {message_id} already applied",
                    thread.thread_id
                );
                return Ok(self.replay(&thread, message_id, connection).await);
            }
        }

        let result = self
            .apply(thread.machine.clone(), action, &thread, connection)
            .await;
        if slot.generation() != generation {
            warn!(
                "Thread {} was abandoned while a transition ran, discarding its result",
                thread.thread_id
            );
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!("Thread {} was abandoned", thread.thread_id),
            ));
        }
        let step = match result {
            Ok(step) => step,
            Err(err) => return Err(record_failure(&mut thread, err)),
        };

        let previous = thread.machine.state_name();
        thread.machine = step.machine;
        thread.touch();
        if let Some((message_id, kind)) = &inbound {
            thread.mark_applied(message_id);
            thread.pending.resolve(*kind);
        }
        if thread.machine.is_terminal() {
            thread.pending.clear();
        }
        debug!(
            "Thread {}: {previous} -> {}",
            thread.thread_id,
            thread.machine.state_name()
        );
        self.index_connection_key(&thread);
        if let Some(record) = thread.held_credential() {
            self.store_credential(record);
        }

        if let Some(outbound) = step.outbound {
            match route(&thread, connection) {
                Some(route) => self.deliver(&route, &outbound.message).await,
                None => warn!(
                    "Thread {}: no route for {}",
                    thread.thread_id,
                    outbound.message.kind()
                ),
            }
            if let Some(expected) = outbound.expects {
                let deadline = Utc::now() + thread.policy.reply_timeout();
                thread
                    .pending
                    .register(expected, deadline, outbound.message.clone())?;
            }
            thread.last_outbound = Some(LastOutbound {
                message: outbound.message,
                answers: inbound.map(|(message_id, _)| message_id),
            });
        }
        Ok(Transition::Applied(thread.machine.state_name()))
    }

    /// Re-sends our answer to an inbound message seen before, if it was the last thing we sent.
    async fn replay(
        &self,
        thread: &ExchangeThread,
        message_id: &str,
        connection: Option<&ConnectionSnapshot>,
    ) -> Transition {
        let answer = thread
            .last_outbound
            .as_ref()
            .filter(|last| last.answers.as_deref() == Some(message_id));
        match (answer, route(thread, connection)) {
            (Some(last), Some(route)) => {
                info!(
                    "Thread {}: re-sending {} answering {message_id}",
                    thread.thread_id,
                    last.message.kind()
                );
                self.deliver(&route, &last.message).await;
                Transition::Replayed { resent: true }
            }
            _ => Transition::Replayed { resent: false },
        }
    }

    async fn deliver(&self, route: &ConnectionSnapshot, message: &AriesMessage) {
        if let Err(err) = self.try_deliver(route, message).await {
            warn!(
                "Sending {} {} on {} failed, left to retries: {}",
                message.kind(),
                message.id(),
                route.thread_id,
                err
            );
        }
    }

    async fn try_deliver(
        &self,
        route: &ConnectionSnapshot,
        message: &AriesMessage,
    ) -> VcxResult<()> {
        let target = route.target()?;
        trace!(
            "Sending {} {} to {}",
            message.kind(),
            message.id(),
            target.service_endpoint
        );
        let envelope = EncryptionEnvelope::create_from_keys(
            self.wallet.as_ref(),
            &message.to_vec()?,
            route.my_vk(),
            &target.recipient_key,
            &target.routing_keys,
        )
        .await?;
        self.transport
            .send_message(envelope.0, &target.service_endpoint)
            .await
    }

    async fn apply(
        &self,
        machine: ThreadMachine,
        action: Action,
        thread: &ExchangeThread,
        connection: Option<&ConnectionSnapshot>,
    ) -> VcxResult<Step> {
        let wallet = self.wallet.as_ref();
        let ledger = self.ledger.as_ref();
        let ledger_policy = self.config.ledger_retry_policy();

        match (machine, action) {
            // Connection
            (
                ThreadMachine::Inviter(sm),
                Action::Inbound(AriesMessage::Connection(Connection::Request(request))),
            ) => {
                sm.ensure_awaiting_request()?;
                let pairwise_info = PairwiseInfo::create(wallet).await?;
                let sm = sm
                    .handle_connection_request(request, pairwise_info)?
                    .send_response(wallet)
                    .await?;
                let response = sm.get_response()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Inviter(sm),
                    response.into(),
                    MessageKind::Ack,
                ))
            }
            (
                ThreadMachine::Inviter(sm),
                Action::Inbound(AriesMessage::Notification(Notification::Ack(_))),
            ) => Ok(Step::silent(ThreadMachine::Inviter(sm.handle_ack()?))),
            (
                ThreadMachine::Inviter(sm),
                Action::Inbound(AriesMessage::TrustPing(TrustPing::Ping(ping))),
            ) => Ok(Step::answer_ping(
                ThreadMachine::Inviter(sm.complete_by_activity()?),
                &ping,
            )),
            (ThreadMachine::Inviter(sm), Action::Activity) => Ok(Step::silent(
                ThreadMachine::Inviter(sm.complete_by_activity()?),
            )),
            (ThreadMachine::Invitee(sm), Action::SendRequest) => {
                let sm = sm.send_request(
                    &self.config.label,
                    &self.config.service_endpoint,
                    self.config.routing_keys.clone(),
                )?;
                let request = sm.get_request()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Invitee(sm),
                    request.into(),
                    MessageKind::ConnectionResponse,
                ))
            }
            (
                ThreadMachine::Invitee(sm),
                Action::Inbound(AriesMessage::Connection(Connection::Response(response))),
            ) => {
                let sm = sm.handle_connection_response(wallet, response).await?;
                Ok(match sm.get_ack().cloned() {
                    Some(ack) => Step::send(ThreadMachine::Invitee(sm), ack.into()),
                    None => Step::silent(ThreadMachine::Invitee(sm)),
                })
            }
            (
                ThreadMachine::Invitee(sm),
                Action::Inbound(AriesMessage::TrustPing(TrustPing::Ping(ping))),
            ) => Ok(Step::answer_ping(ThreadMachine::Invitee(sm), &ping)),
            (
                machine @ (ThreadMachine::Inviter(_) | ThreadMachine::Invitee(_)),
                Action::Inbound(AriesMessage::DiscoverFeatures(DiscoverFeatures::Query(query))),
            ) => Ok(Step::send(machine, build_disclose(&query).into())),
            (
                machine @ (ThreadMachine::Inviter(_) | ThreadMachine::Invitee(_)),
                Action::Inbound(AriesMessage::BasicMessage(_)),
            ) => Ok(Step::silent(machine)),

            // Issuance
            (ThreadMachine::Issuer(sm), Action::OfferCredential(offer_info)) => {
                let issuer = issuer_identity(thread)?;
                let schema = resolve_schema(ledger, &ledger_policy, &offer_info.schema_id).await?;
                let sm = sm.build_offer(&schema, offer_info, &issuer.pw_did)?;
                let offer = sm.get_offer()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Issuer(sm),
                    offer.into(),
                    MessageKind::CredentialRequest,
                ))
            }
            (
                ThreadMachine::Issuer(sm),
                Action::Inbound(AriesMessage::CredentialIssuance(
                    CredentialIssuance::RequestCredential(request),
                )),
            ) => {
                let issuer = issuer_identity(thread)?;
                let keys = IssuerKeys {
                    did: &issuer.pw_did,
                    verkey: &issuer.pw_vk,
                };
                let sm = sm
                    .receive_request(request)?
                    .issue_credential(wallet, ledger, &ledger_policy, keys)
                    .await?;
                let issue = sm.get_issue()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Issuer(sm),
                    issue.into(),
                    MessageKind::CredentialAck,
                ))
            }
            (
                ThreadMachine::Issuer(sm),
                Action::Inbound(
                    AriesMessage::CredentialIssuance(CredentialIssuance::Ack(_))
                    | AriesMessage::Notification(Notification::Ack(_)),
                ),
            ) => Ok(Step::silent(ThreadMachine::Issuer(sm.receive_ack()?))),
            (ThreadMachine::Holder(sm), Action::RequestCredential) => {
                let my = connection
                    .and_then(|connection| connection.my.as_ref())
                    .ok_or_else(|| {
                        not_established(thread.connection_id.as_deref().unwrap_or_default())
                    })?;
                let sm = sm.send_request(&my.pw_did)?;
                let request = sm.get_request()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Holder(sm),
                    request.into(),
                    MessageKind::CredentialIssue,
                ))
            }
            (ThreadMachine::Holder(sm), Action::DeclineOffer(reason)) => {
                let sm = sm.decline_offer(&reason)?;
                Ok(match sm.get_problem_report().cloned() {
                    Some(report) => Step::send(ThreadMachine::Holder(sm), report.into()),
                    None => Step::silent(ThreadMachine::Holder(sm)),
                })
            }
            (
                ThreadMachine::Holder(sm),
                Action::Inbound(AriesMessage::CredentialIssuance(
                    CredentialIssuance::IssueCredential(issue),
                )),
            ) => {
                let issuer = issuer_identity(thread)?;
                let sm = sm.receive_credential(wallet, issue, &issuer.pw_vk).await?;
                if sm.get_state() != HolderState::IssueReceived {
                    return Ok(Step::silent(ThreadMachine::Holder(sm)));
                }
                let sm = sm.send_ack()?;
                let ack = sm.get_ack()?.clone();
                Ok(Step::send(ThreadMachine::Holder(sm), ack.into()))
            }

            // Proof presentation
            (ThreadMachine::Verifier(sm), Action::Open) => {
                let request = sm.get_request_msg()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Verifier(sm),
                    request.into(),
                    MessageKind::Presentation,
                ))
            }
            (
                ThreadMachine::Verifier(sm),
                Action::Inbound(AriesMessage::PresentProof(PresentProof::Presentation(
                    presentation,
                ))),
            ) => {
                let sm = sm.receive_presentation(presentation)?;
                if sm.get_state() != VerifierState::PresentationReceived {
                    return Ok(Step::silent(ThreadMachine::Verifier(sm)));
                }
                let sm = sm.verify(wallet, ledger, &ledger_policy).await?;
                let reply: Option<AriesMessage> = match sm.get_state() {
                    VerifierState::Verified => Some(sm.get_ack()?.clone().into()),
                    _ => sm.get_problem_report().cloned().map(Into::into),
                };
                Ok(match reply {
                    Some(reply) => Step::send(ThreadMachine::Verifier(sm), reply),
                    None => Step::silent(ThreadMachine::Verifier(sm)),
                })
            }
            (ThreadMachine::Prover(sm), Action::PresentProof) => {
                let credentials = self.usable_credentials()?;
                let sm = sm
                    .send_presentation(ledger, &ledger_policy, &credentials)
                    .await?;
                let presentation = sm.get_presentation_msg()?.clone();
                Ok(Step::expect(
                    ThreadMachine::Prover(sm),
                    presentation.into(),
                    MessageKind::PresentationAck,
                ))
            }
            (ThreadMachine::Prover(sm), Action::DeclinePresentationRequest(reason)) => {
                let sm = sm.decline_presentation_request(&reason)?;
                Ok(match sm.get_problem_report().cloned() {
                    Some(report) => Step::send(ThreadMachine::Prover(sm), report.into()),
                    None => Step::silent(ThreadMachine::Prover(sm)),
                })
            }
            (
                ThreadMachine::Prover(sm),
                Action::Inbound(AriesMessage::PresentProof(PresentProof::Ack(ack))),
            ) => Ok(Step::silent(ThreadMachine::Prover(sm.receive_ack(ack)?))),
            (
                ThreadMachine::Prover(sm),
                Action::Inbound(AriesMessage::Notification(Notification::Ack(ack))),
            ) => {
                let ack = AckPresentation::builder()
                    .id(ack.id)
                    .content(ack.content.into())
                    .decorators(ack.decorators)
                    .build();
                Ok(Step::silent(ThreadMachine::Prover(sm.receive_ack(ack)?)))
            }

            // Trust ping
            (ThreadMachine::TrustPing(sm), Action::Open) => {
                let ping: AriesMessage = sm.get_ping().clone().into();
                Ok(if sm.is_terminal() {
                    Step::send(ThreadMachine::TrustPing(sm), ping)
                } else {
                    Step::expect(ThreadMachine::TrustPing(sm), ping, MessageKind::PingResponse)
                })
            }
            (
                ThreadMachine::TrustPing(sm),
                Action::Inbound(AriesMessage::TrustPing(TrustPing::PingResponse(response))),
            ) => Ok(Step::silent(ThreadMachine::TrustPing(
                sm.handle_ping_response(&response)?,
            ))),

            // Feature discovery
            (ThreadMachine::FeatureQuery(sm), Action::Open) => {
                let query = sm.get_query().clone();
                Ok(Step::expect(
                    ThreadMachine::FeatureQuery(sm),
                    query.into(),
                    MessageKind::FeatureDisclose,
                ))
            }
            (
                ThreadMachine::FeatureQuery(sm),
                Action::Inbound(AriesMessage::DiscoverFeatures(DiscoverFeatures::Disclose(
                    disclose,
                ))),
            ) => Ok(Step::silent(ThreadMachine::FeatureQuery(
                sm.handle_disclose(disclose)?,
            ))),

            (machine, Action::Inbound(AriesMessage::ReportProblem(report))) => {
                let machine = match machine {
                    ThreadMachine::Inviter(sm) => {
                        ThreadMachine::Inviter(sm.handle_problem_report(report)?)
                    }
                    ThreadMachine::Invitee(sm) => {
                        ThreadMachine::Invitee(sm.handle_problem_report(report)?)
                    }
                    ThreadMachine::Issuer(sm) => {
                        ThreadMachine::Issuer(sm.receive_problem_report(report)?)
                    }
                    ThreadMachine::Holder(sm) => {
                        ThreadMachine::Holder(sm.receive_problem_report(report)?)
                    }
                    ThreadMachine::Verifier(sm) => {
                        ThreadMachine::Verifier(sm.receive_problem_report(report)?)
                    }
                    ThreadMachine::Prover(sm) => {
                        ThreadMachine::Prover(sm.receive_problem_report(report)?)
                    }
                    ThreadMachine::TrustPing(sm) => ThreadMachine::TrustPing(
                        sm.abandon(&format!("problem report: {}", problem_report_reason(&report))),
                    ),
                    ThreadMachine::FeatureQuery(sm) => ThreadMachine::FeatureQuery(
                        sm.abandon(&format!("problem report: {}", problem_report_reason(&report))),
                    ),
                };
                Ok(Step::silent(machine))
            }
            (machine, Action::Inbound(message)) => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!(
                    "{} is not expected by the {} of thread {} in state {}",
                    message.kind(),
                    machine.role(),
                    thread.thread_id,
                    machine.state_name()
                ),
            )),
            (machine, action) => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::WrongState,
                format!(
                    "{action:?} does not apply to the {} of thread {} in state {}",
                    machine.role(),
                    thread.thread_id,
                    machine.state_name()
                ),
            )),
        }
    }
}

fn route(
    thread: &ExchangeThread,
    connection: Option<&ConnectionSnapshot>,
) -> Option<ConnectionSnapshot> {
    thread
        .machine
        .connection_snapshot()
        .or_else(|| connection.cloned())
}

fn issuer_identity(thread: &ExchangeThread) -> VcxResult<&PairwiseInfo> {
    thread.issuer.as_ref().ok_or_else(|| {
        AriesVcxError::from_msg(
            AriesVcxErrorKind::InvalidState,
            format!("Thread {} has no issuer identity", thread.thread_id),
        )
    })
}

fn not_established(connection_id: &str) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::WrongState,
        format!("Connection {connection_id} is not established"),
    )
}

fn record_failure(thread: &mut ExchangeThread, err: AriesVcxError) -> AriesVcxError {
    match err.category() {
        ErrorCategory::Validation => {
            debug!("Thread {}: rejected input: {}", thread.thread_id, err.msg());
        }
        ErrorCategory::State => {
            warn!("Thread {}: {}", thread.thread_id, err.msg());
            thread.record_error(&err);
        }
        _ => {
            error!(
                "Thread {} abandoned after {:?} failure: {}",
                thread.thread_id,
                err.kind(),
                err.msg()
            );
            thread.abandon(&format!("{:?}", err.kind()));
            thread.record_error(&err);
        }
    }
    err
}

#[cfg(test)]
mod unit_tests {
    use std::fmt::{self, Debug, Formatter};

    use async_trait::async_trait;
    use mockall::mock;
    use test_utils::devsetup::build_setup_profile;
    use url::Url;

    use super::*;
    use crate::{
        handlers::correlation::thread::ProtocolKind,
        protocols::connection::invitation::AnyInvitation,
    };

    mock! {
        pub Transport {}

        #[async_trait]
        impl Transport for Transport {
            async fn send_message(&self, msg: Vec<u8>, service_endpoint: &Url) -> VcxResult<()>;
        }
    }

    impl Debug for MockTransport {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str("MockTransport")
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .label("faber")
            .service_endpoint(Url::parse("http://faber.example.org:8080/agent").unwrap())
            .reply_timeout_ms(1_000)
            .max_retries(2)
            .build()
    }

    async fn engine_with(transport: MockTransport) -> ExchangeEngine {
        let setup = build_setup_profile();
        ExchangeEngine::new(config(), setup.wallet, setup.ledger, Arc::new(transport)).unwrap()
    }

    async fn foreign_invitation() -> AnyInvitation {
        let setup = build_setup_profile();
        let key = PairwiseInfo::create(setup.wallet.as_ref()).await.unwrap();
        AnyInvitation::Con(build_invitation(
            &key,
            "alice",
            &Url::parse("http://alice.example.org:8080").unwrap(),
            vec![],
        ))
    }

    #[tokio::test]
    async fn test_unanswered_request_is_retried_then_abandoned() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_message()
            .times(3)
            .returning(|_, _| Ok(()));
        let engine = engine_with(transport).await;

        let connection_id = engine
            .accept_invitation(foreign_invitation().await)
            .await
            .unwrap();
        let status = engine.thread_status(&connection_id).await.unwrap();
        assert_eq!(status.state, "RequestSent");
        assert_eq!(status.pending, vec![MessageKind::ConnectionResponse]);

        let mut now = Utc::now();
        for _ in 0..2 {
            now += chrono::Duration::milliseconds(1_001);
            let report = engine.check_timeouts(now).await.unwrap();
            assert_eq!(report.resent, vec![connection_id.clone()]);
        }
        now += chrono::Duration::milliseconds(1_001);
        let report = engine.check_timeouts(now).await.unwrap();
        assert_eq!(report.abandoned, vec![connection_id.clone()]);

        let status = engine.thread_status(&connection_id).await.unwrap();
        assert!(status.is_abandoned());
        assert!(status.pending.is_empty());
        let last_error = status.last_error.unwrap();
        assert_eq!(last_error.kind, AriesVcxErrorKind::ExchangeTimedOut);
        assert_eq!(last_error.category, ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn test_deadline_not_reached_is_left_alone() {
        let mut transport = MockTransport::new();
        transport
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));
        let engine = engine_with(transport).await;
        engine
            .accept_invitation(foreign_invitation().await)
            .await
            .unwrap();

        let report = engine.check_timeouts(Utc::now()).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_exchange_pending() {
        let mut transport = MockTransport::new();
        transport.expect_send_message().returning(|_, _| {
            Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::PostMessageFailed,
                "connection refused",
            ))
        });
        let engine = engine_with(transport).await;

        let connection_id = engine
            .accept_invitation(foreign_invitation().await)
            .await
            .unwrap();
        let status = engine.thread_status(&connection_id).await.unwrap();
        assert_eq!(status.state, "RequestSent");
        assert_eq!(status.pending.len(), 1);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_invitation_creates_no_thread() {
        let engine = engine_with(MockTransport::new()).await;
        let AnyInvitation::Con(mut invitation) = foreign_invitation().await else {
            unreachable!()
        };
        invitation.content.service_endpoint = "not a url".to_owned();

        let err = engine
            .receive_invitation(AnyInvitation::Con(invitation))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(engine.threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operations_on_abandoned_thread_are_state_errors() {
        let engine = engine_with(MockTransport::new()).await;
        let connection_id = engine
            .receive_invitation(foreign_invitation().await)
            .await
            .unwrap();

        let status = engine.abandon(&connection_id, "operator request").await.unwrap();
        assert!(status.is_abandoned());
        assert_eq!(status.protocol, ProtocolKind::Connection);

        let err = engine.send_request(&connection_id).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::State);
        let status = engine.thread_status(&connection_id).await.unwrap();
        assert_eq!(status.last_error.unwrap().kind, AriesVcxErrorKind::WrongState);

        let err = engine.abandon(&connection_id, "again").await.unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::WrongState);
    }

    #[tokio::test]
    async fn test_offer_requires_established_connection() {
        let engine = engine_with(MockTransport::new()).await;
        let (connection_id, _) = engine.create_invitation().await.unwrap();
        let offer = OfferInfo {
            schema_id: anoncreds_types::data_types::identifiers::schema_id::SchemaId::new_unchecked(
                "V4SGRU86Z58d6TV7PBUe6f:2:person:1.0",
            ),
            attributes: vec![],
            rev_reg_id: None,
            comment: None,
        };
        let err = engine
            .offer_credential(&connection_id, offer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::WrongState);
        assert_eq!(engine.threads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_thread_is_mismatch() {
        let engine = engine_with(MockTransport::new()).await;
        let (connection_id, _) = engine.create_invitation().await.unwrap();
        let (id, content, decorators) =
            crate::protocols::common::build_ack_parts("no-such-thread");
        let ack = messages::msg_fields::protocols::notification::ack::Ack::builder()
            .id(id)
            .content(content)
            .decorators(decorators)
            .build();

        let err = engine
            .receive_message(UnpackedMessage {
                message: ack.into(),
                sender_vk: None,
                recipient_vk: "unknown".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::ThreadMismatch);
        let status = engine.thread_status(&connection_id).await.unwrap();
        assert_eq!(status.state, "InvitationSent");
        assert!(status.last_error.is_none());
    }
}
