use messages::{
    decorators::{thread::Thread, timing::Timing},
    msg_fields::protocols::discover_features::{
        disclose::{Disclose, DiscloseContent, DiscloseDecorators},
        query::{Query, QueryContent, QueryDecorators},
        ProtocolDescriptor,
    },
};
use uuid::Uuid;

use crate::errors::error::prelude::*;

/// Asks for every protocol when no query is given.
pub fn build_query(query: Option<String>, comment: Option<String>) -> Query {
    let query = query.unwrap_or_else(|| "*".to_owned());
    let content = match comment {
        Some(comment) => QueryContent::builder().query(query).comment(comment).build(),
        None => QueryContent::builder().query(query).build(),
    };
    Query::builder()
        .id(Uuid::new_v4().to_string())
        .content(content)
        .decorators(QueryDecorators::builder().timing(Timing::now()).build())
        .build()
}

/// Answers a query with the supported protocols matching it, threaded on the query id.
pub fn build_disclose(query: &Query) -> Disclose {
    let decorators = DiscloseDecorators::builder()
        .thread(Thread::new(query.id.clone()))
        .timing(Timing::now())
        .build();
    Disclose::builder()
        .id(Uuid::new_v4().to_string())
        .content(
            DiscloseContent::builder()
                .protocols(query.content.lookup())
                .build(),
        )
        .decorators(decorators)
        .build()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureDiscoveryState {
    QuerySent,
    Disclosed,
    Abandoned,
}

/// Querying side of feature discovery. The responder answers from the connection thread
/// without keeping state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureQuerier {
    query: Query,
    state: FeatureDiscoveryState,
    protocols: Vec<ProtocolDescriptor>,
    abandon_reason: Option<String>,
}

impl FeatureQuerier {
    pub fn build(query: Option<String>, comment: Option<String>) -> Self {
        Self {
            query: build_query(query, comment),
            state: FeatureDiscoveryState::QuerySent,
            protocols: Vec::new(),
            abandon_reason: None,
        }
    }

    pub fn get_query(&self) -> &Query {
        &self.query
    }

    pub fn get_thread_id(&self) -> &str {
        &self.query.id
    }

    pub fn get_state(&self) -> FeatureDiscoveryState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != FeatureDiscoveryState::QuerySent
    }

    /// Protocols the peer disclosed. Empty until the disclose arrives.
    pub fn protocols(&self) -> &[ProtocolDescriptor] {
        &self.protocols
    }

    pub fn abandon_reason(&self) -> Option<&str> {
        self.abandon_reason.as_deref()
    }

    pub fn handle_disclose(mut self, disclose: Disclose) -> VcxResult<Self> {
        if !matches_thread_id!(disclose, self.get_thread_id()) {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::ThreadMismatch,
                "Thread ID mismatch",
            ));
        }
        if self.state != FeatureDiscoveryState::QuerySent {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::UnexpectedMessage,
                format!("Disclose was not expected in state {:?}", self.state),
            ));
        }
        debug!(
            "Feature query {} answered with {} protocol(s)",
            self.get_thread_id(),
            disclose.content.protocols.len()
        );
        self.protocols = disclose.content.protocols;
        self.state = FeatureDiscoveryState::Disclosed;
        Ok(self)
    }

    pub fn abandon(mut self, reason: &str) -> Self {
        if self.state != FeatureDiscoveryState::Abandoned {
            info!("Feature query {} abandoned: {reason}", self.get_thread_id());
            self.state = FeatureDiscoveryState::Abandoned;
            self.abandon_reason = Some(reason.to_owned());
        }
        self
    }
}
