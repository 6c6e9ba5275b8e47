use messages::{
    decorators::{thread::Thread, timing::Timing},
    msg_fields::protocols::trust_ping::{
        ping::{Ping, PingContent, PingDecorators},
        ping_response::{PingResponse, PingResponseContent, PingResponseDecorators},
    },
};
use uuid::Uuid;

use crate::errors::error::prelude::*;

pub fn build_ping(request_response: bool, comment: Option<String>) -> Ping {
    let content = match comment {
        Some(comment) => PingContent::builder()
            .response_requested(request_response)
            .comment(comment)
            .build(),
        None => PingContent::builder()
            .response_requested(request_response)
            .build(),
    };
    Ping::builder()
        .id(Uuid::new_v4().to_string())
        .content(content)
        .decorators(PingDecorators::builder().timing(Timing::now()).build())
        .build()
}

pub fn build_ping_response(ping: &Ping) -> PingResponse {
    let thread_id = ping
        .decorators
        .thread
        .as_ref()
        .map(|t| t.thid.as_str())
        .unwrap_or(ping.id.as_str())
        .to_owned();
    let decorators = PingResponseDecorators::builder()
        .thread(Thread::new(thread_id))
        .timing(Timing::now())
        .build();
    PingResponse::builder()
        .id(Uuid::new_v4().to_string())
        .content(PingResponseContent::default())
        .decorators(decorators)
        .build()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPingState {
    PingSent,
    Completed,
    Abandoned,
}

/// Sender side of a trust ping. Without `response_requested` the thread completes as
/// soon as the ping is out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrustPingSender {
    ping: Ping,
    state: TrustPingState,
    abandon_reason: Option<String>,
}

impl TrustPingSender {
    pub fn build(request_response: bool, comment: Option<String>) -> TrustPingSender {
        let ping = build_ping(request_response, comment);
        let state = if request_response {
            TrustPingState::PingSent
        } else {
            TrustPingState::Completed
        };
        Self {
            ping,
            state,
            abandon_reason: None,
        }
    }

    pub fn get_ping(&self) -> &Ping {
        &self.ping
    }

    pub fn get_thread_id(&self) -> &str {
        self.ping
            .decorators
            .thread
            .as_ref()
            .map(|t| t.thid.as_str())
            .unwrap_or(self.ping.id.as_str())
    }

    pub fn get_state(&self) -> TrustPingState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != TrustPingState::PingSent
    }

    pub fn abandon_reason(&self) -> Option<&str> {
        self.abandon_reason.as_deref()
    }

    pub fn handle_ping_response(mut self, response: &PingResponse) -> VcxResult<Self> {
        if !matches_thread_id!(response, self.get_thread_id()) {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::ThreadMismatch,
                "Thread ID mismatch",
            ));
        }
        match self.state {
            TrustPingState::PingSent => {
                debug!("Trust ping {} answered", self.get_thread_id());
                self.state = TrustPingState::Completed;
                Ok(self)
            }
            TrustPingState::Completed if self.ping.content.response_requested => Ok(self),
            _ => Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                "Message was not expected",
            )),
        }
    }

    pub fn abandon(mut self, reason: &str) -> Self {
        if self.state != TrustPingState::Abandoned {
            info!("Trust ping {} abandoned: {reason}", self.get_thread_id());
            self.state = TrustPingState::Abandoned;
            self.abandon_reason = Some(reason.to_owned());
        }
        self
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_build_send_ping_process_response() {
        let sender = TrustPingSender::build(true, None);
        assert_eq!(sender.get_state(), TrustPingState::PingSent);
        let ping_response = build_ping_response(sender.get_ping());
        let sender = sender.handle_ping_response(&ping_response).unwrap();
        assert_eq!(sender.get_state(), TrustPingState::Completed);
    }

    #[test]
    fn test_should_fail_on_thread_id_mismatch() {
        let sender1 = TrustPingSender::build(true, None);
        let sender2 = TrustPingSender::build(true, None);
        let ping_response = build_ping_response(sender2.get_ping());
        let err = sender1.handle_ping_response(&ping_response).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::ThreadMismatch);
    }

    #[test]
    fn test_should_fail_if_response_was_not_expected() {
        let sender = TrustPingSender::build(false, Some("hello".to_string()));
        assert_eq!(sender.get_ping().content.comment, Some("hello".to_string()));
        assert!(sender.is_terminal());
        let ping_response = build_ping_response(sender.get_ping());
        let err = sender.handle_ping_response(&ping_response).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::UnexpectedMessage);
    }

    #[test]
    fn test_response_threads_to_ping_thread() {
        let mut ping = build_ping(true, None);
        ping.decorators.thread = Some(Thread::new("connection-thread"));
        let response = build_ping_response(&ping);
        assert_eq!(response.decorators.thread.thid, "connection-thread");
    }
}
