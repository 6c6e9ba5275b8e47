//! Module containing the `connection` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0160-connection-protocol/README.md>).

pub mod did_doc;
pub mod invitation;
pub mod request;
pub mod response;

use derive_more::From;
use serde::{Deserialize, Serialize};

use self::{did_doc::AriesDidDoc, invitation::Invitation, request::Request, response::Response};
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum Connection {
    Invitation(Invitation),
    Request(Request),
    Response(Response),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionData {
    #[serde(rename = "DID")]
    pub did: String,
    #[serde(rename = "DIDDoc")]
    pub did_doc: AriesDidDoc,
}

impl ConnectionData {
    pub fn new(did: String, did_doc: AriesDidDoc) -> Self {
        Self { did, did_doc }
    }
}

transit_to_aries_msg!(Invitation: Connection);
transit_to_aries_msg!(Request: Connection);
transit_to_aries_msg!(Response: Connection);
