//! Module containing the `routing` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0094-cross-domain-messaging/README.md>).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::{misc::NoDecorators, msg_parts::MsgParts};

pub type Forward = MsgParts<ForwardContent, NoDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ForwardContent {
    pub to: String,
    pub msg: Value,
}
