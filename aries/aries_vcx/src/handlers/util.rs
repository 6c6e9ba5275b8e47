use messages::{
    msg_fields::protocols::{
        connection::Connection, cred_issuance::CredentialIssuance,
        discover_features::DiscoverFeatures, notification::Notification, out_of_band::OutOfBand,
        present_proof::PresentProof, trust_ping::TrustPing,
    },
    AriesMessage,
};
use strum_macros::{AsRefStr, EnumString};

use crate::errors::error::{AriesVcxError, AriesVcxErrorKind, VcxResult};

#[macro_export]
macro_rules! matches_thread_id {
    ($msg:expr, $id:expr) => {
        $msg.decorators.thread.thid == $id || $msg.decorators.thread.pthid.as_deref() == Some($id)
    };
}

#[macro_export]
macro_rules! matches_opt_thread_id {
    ($msg:expr, $id:expr) => {
        match $msg.decorators.thread.as_ref() {
            Some(t) => t.thid == $id || t.pthid.as_deref() == Some($id),
            None => $msg.id == $id,
        }
    };
}

pub use matches_opt_thread_id;
pub use matches_thread_id;

pub fn verify_thread_id(thread_id: &str, message: &AriesMessage) -> VcxResult<()> {
    let is_match = match message {
        AriesMessage::Routing(_) => false,
        AriesMessage::Connection(Connection::Invitation(msg)) => msg.id == thread_id,
        AriesMessage::Connection(Connection::Request(msg)) => {
            matches_opt_thread_id!(msg, thread_id)
        }
        AriesMessage::Connection(Connection::Response(msg)) => matches_thread_id!(msg, thread_id),
        AriesMessage::CredentialIssuance(CredentialIssuance::OfferCredential(msg)) => {
            matches_opt_thread_id!(msg, thread_id)
        }
        AriesMessage::CredentialIssuance(CredentialIssuance::RequestCredential(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::CredentialIssuance(CredentialIssuance::IssueCredential(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::CredentialIssuance(CredentialIssuance::Ack(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::PresentProof(PresentProof::RequestPresentation(msg)) => {
            matches_opt_thread_id!(msg, thread_id)
        }
        AriesMessage::PresentProof(PresentProof::Presentation(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::PresentProof(PresentProof::Ack(msg)) => matches_thread_id!(msg, thread_id),
        AriesMessage::Notification(Notification::Ack(msg)) => matches_thread_id!(msg, thread_id),
        AriesMessage::ReportProblem(msg) => matches_thread_id!(msg, thread_id),
        AriesMessage::TrustPing(TrustPing::Ping(msg)) => matches_opt_thread_id!(msg, thread_id),
        AriesMessage::TrustPing(TrustPing::PingResponse(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::OutOfBand(OutOfBand::Invitation(msg)) => msg.id == thread_id,
        AriesMessage::DiscoverFeatures(DiscoverFeatures::Query(msg)) => msg.id == thread_id,
        AriesMessage::DiscoverFeatures(DiscoverFeatures::Disclose(msg)) => {
            matches_thread_id!(msg, thread_id)
        }
        AriesMessage::BasicMessage(msg) => matches_opt_thread_id!(msg, thread_id),
    };

    if !is_match {
        return Err(AriesVcxError::from_msg(
            AriesVcxErrorKind::ThreadMismatch,
            format!(
                "Cannot handle message {}: thread id does not match, expected {:?}",
                message.id(),
                thread_id
            ),
        ));
    };

    Ok(())
}

#[derive(Debug, Clone, Copy, AsRefStr, EnumString, PartialEq, Eq)]
pub enum AttachmentId {
    #[strum(serialize = "libindy-cred-offer-0")]
    CredentialOffer,
    #[strum(serialize = "libindy-cred-request-0")]
    CredentialRequest,
    #[strum(serialize = "libindy-cred-0")]
    Credential,
    #[strum(serialize = "libindy-request-presentation-0")]
    PresentationRequest,
    #[strum(serialize = "libindy-presentation-0")]
    Presentation,
}

#[cfg(test)]
mod unit_tests {
    use messages::{
        decorators::thread::Thread,
        msg_fields::protocols::notification::ack::{Ack, AckContent, AckDecorators, AckStatus},
    };

    use super::*;

    fn ack(thread: Thread) -> AriesMessage {
        Ack::builder()
            .id("ack-1".to_owned())
            .content(AckContent::builder().status(AckStatus::Ok).build())
            .decorators(AckDecorators::builder().thread(thread).build())
            .build()
            .into()
    }

    #[test]
    fn test_thread_and_parent_thread_match() {
        let msg = ack(Thread::builder()
            .thid("thread-1".to_owned())
            .pthid("invitation-1".to_owned())
            .build());
        verify_thread_id("thread-1", &msg).unwrap();
        verify_thread_id("invitation-1", &msg).unwrap();
        let err = verify_thread_id("thread-2", &msg).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::ThreadMismatch);
    }

    #[test]
    fn test_attachment_ids() {
        assert_eq!(AttachmentId::Credential.as_ref(), "libindy-cred-0");
        assert_eq!(
            "libindy-presentation-0".parse::<AttachmentId>().unwrap(),
            AttachmentId::Presentation
        );
    }
}
