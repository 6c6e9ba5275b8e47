use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    msg_fields::protocols::notification::ack::{AckContent, AckDecorators},
    msg_parts::MsgParts,
};

pub type AckCredential = MsgParts<AckCredentialContent, AckDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
#[serde(transparent)]
pub struct AckCredentialContent {
    pub inner: AckContent,
}

impl From<AckContent> for AckCredentialContent {
    fn from(value: AckContent) -> Self {
        Self { inner: value }
    }
}
