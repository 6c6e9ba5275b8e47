use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use messages::{msg_types::MessageKind, AriesMessage};

use crate::errors::error::prelude::*;

/// One outstanding reply expectation and the message to re-send while it is unanswered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingExchange {
    pub expected: MessageKind,
    pub deadline: DateTime<Utc>,
    pub retries: u32,
    pub outbound: AriesMessage,
}

impl PendingExchange {
    /// A problem report answers anything, a generic ack answers any ack.
    pub fn is_answered_by(&self, received: MessageKind) -> bool {
        received == self.expected
            || received == MessageKind::ProblemReport
            || (received == MessageKind::Ack && self.expected.is_ack())
    }
}

/// Reply expectations of one thread in registration order. Only the head can be
/// resolved or expire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PendingExchanges {
    queue: VecDeque<PendingExchange>,
}

impl PendingExchanges {
    pub fn register(
        &mut self,
        expected: MessageKind,
        deadline: DateTime<Utc>,
        outbound: AriesMessage,
    ) -> VcxResult<()> {
        if self.queue.iter().any(|pending| pending.expected == expected) {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::DuplicatePendingExchange,
                format!("A {expected} reply is already pending"),
            ));
        }
        self.queue.push_back(PendingExchange {
            expected,
            deadline,
            retries: 0,
            outbound,
        });
        Ok(())
    }

    /// Resolves the head expectation if `received` answers it.
    pub fn resolve(&mut self, received: MessageKind) -> Option<PendingExchange> {
        if self.queue.front()?.is_answered_by(received) {
            self.queue.pop_front()
        } else {
            None
        }
    }

    /// The head, if its deadline has passed.
    pub fn expired_head(&mut self, now: DateTime<Utc>) -> Option<&mut PendingExchange> {
        self.queue.front_mut().filter(|pending| pending.deadline <= now)
    }

    pub fn expected_kinds(&self) -> Vec<MessageKind> {
        self.queue.iter().map(|pending| pending.expected).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod unit_tests {
    use chrono::Duration;
    use messages::msg_fields::protocols::trust_ping::ping::{Ping, PingContent, PingDecorators};

    use super::*;

    fn outbound() -> AriesMessage {
        Ping::builder()
            .id("ping-1".to_owned())
            .content(PingContent::default())
            .decorators(PingDecorators::default())
            .build()
            .into()
    }

    #[test]
    fn test_one_expectation_per_kind() {
        let mut pending = PendingExchanges::default();
        pending
            .register(MessageKind::CredentialRequest, Utc::now(), outbound())
            .unwrap();
        let err = pending
            .register(MessageKind::CredentialRequest, Utc::now(), outbound())
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::DuplicatePendingExchange);
        assert_eq!(pending.expected_kinds(), vec![MessageKind::CredentialRequest]);
    }

    #[test]
    fn test_only_earliest_expectation_resolves() {
        let mut pending = PendingExchanges::default();
        pending
            .register(MessageKind::CredentialAck, Utc::now(), outbound())
            .unwrap();
        pending
            .register(MessageKind::PresentationAck, Utc::now(), outbound())
            .unwrap();

        assert!(pending.resolve(MessageKind::PresentationAck).is_none());
        let resolved = pending.resolve(MessageKind::Ack).unwrap();
        assert_eq!(resolved.expected, MessageKind::CredentialAck);
        assert_eq!(pending.expected_kinds(), vec![MessageKind::PresentationAck]);

        let resolved = pending.resolve(MessageKind::Ack).unwrap();
        assert_eq!(resolved.expected, MessageKind::PresentationAck);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_problem_report_answers_anything() {
        let mut pending = PendingExchanges::default();
        pending
            .register(MessageKind::Presentation, Utc::now(), outbound())
            .unwrap();
        assert!(pending.resolve(MessageKind::CredentialIssue).is_none());
        assert!(pending.resolve(MessageKind::ProblemReport).is_some());
    }

    #[test]
    fn test_only_head_expires() {
        let now = Utc::now();
        let mut pending = PendingExchanges::default();
        pending
            .register(MessageKind::PingResponse, now + Duration::seconds(10), outbound())
            .unwrap();
        pending
            .register(MessageKind::CredentialIssue, now - Duration::seconds(10), outbound())
            .unwrap();
        assert!(pending.expired_head(now).is_none());
        assert!(pending.expired_head(now + Duration::seconds(10)).is_some());
    }
}
