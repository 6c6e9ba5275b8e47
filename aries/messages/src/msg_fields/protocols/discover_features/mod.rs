//! Module containing the `discover features` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0031-discover-features/README.md>).

pub mod disclose;
pub mod query;

use derive_more::From;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use self::{disclose::Disclose, query::Query};
use crate::{misc::utils::transit_to_aries_msg, msg_types::Protocol};

#[derive(Clone, Debug, From, PartialEq)]
pub enum DiscoverFeatures {
    Query(Query),
    Disclose(Disclose),
}

transit_to_aries_msg!(Query: DiscoverFeatures);
transit_to_aries_msg!(Disclose: DiscoverFeatures);

/// One supported protocol, identified by its versioned URI.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ProtocolDescriptor {
    pub pid: String,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl From<Protocol> for ProtocolDescriptor {
    fn from(protocol: Protocol) -> Self {
        Self::builder().pid(protocol.pid()).build()
    }
}
