use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    msg_fields::protocols::notification::ack::{AckContent, AckDecorators},
    msg_parts::MsgParts,
};

pub type AckPresentation = MsgParts<AckPresentationContent, AckDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
#[serde(transparent)]
pub struct AckPresentationContent {
    pub inner: AckContent,
}

impl From<AckContent> for AckPresentationContent {
    fn from(value: AckContent) -> Self {
        Self { inner: value }
    }
}
