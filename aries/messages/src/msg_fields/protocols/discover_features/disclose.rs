use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use typed_builder::TypedBuilder;

use super::ProtocolDescriptor;
use crate::{
    decorators::{thread::Thread, timing::Timing},
    msg_parts::MsgParts,
    msg_types::Protocol,
};

pub type Disclose = MsgParts<DiscloseContent, DiscloseDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct DiscloseContent {
    pub protocols: Vec<ProtocolDescriptor>,
}

/// Discloses every supported protocol.
impl Default for DiscloseContent {
    fn default() -> Self {
        Self {
            protocols: Protocol::iter().map(ProtocolDescriptor::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct DiscloseDecorators {
    #[serde(rename = "~thread")]
    pub thread: Thread,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}
