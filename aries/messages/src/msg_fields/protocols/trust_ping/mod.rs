//! Module containing the `trust ping` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0048-trust-ping/README.md>).

pub mod ping;
pub mod ping_response;

use derive_more::From;

use self::{ping::Ping, ping_response::PingResponse};
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum TrustPing {
    Ping(Ping),
    PingResponse(PingResponse),
}

transit_to_aries_msg!(Ping: TrustPing);
transit_to_aries_msg!(PingResponse: TrustPing);
