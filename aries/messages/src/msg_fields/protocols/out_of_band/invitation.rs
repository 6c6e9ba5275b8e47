use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    decorators::{attachment::Attachment, timing::Timing},
    msg_parts::MsgParts,
};

pub type OobInvitation = MsgParts<OobInvitationContent, OobInvitationDecorators>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TypedBuilder)]
pub struct OobInvitationContent {
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_protocols: Option<Vec<String>>,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "requests~attach")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_attach: Option<Vec<Attachment>>,
    pub services: Vec<OobService>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OobService {
    Inline(InlineService),
    Did(String),
}

/// `did-communication` service embedded in the invitation; keys are `did:key` encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct InlineService {
    pub id: String,
    #[serde(rename = "type")]
    #[builder(default = "did-communication".to_owned())]
    pub type_: String,
    pub recipient_keys: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TypedBuilder)]
pub struct OobInvitationDecorators {
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}
