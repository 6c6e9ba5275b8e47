//! Module containing the `out of band` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0434-outofband/README.md>).

pub mod invitation;

use derive_more::From;

use self::invitation::OobInvitation;
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum OutOfBand {
    Invitation(OobInvitation),
}

transit_to_aries_msg!(OobInvitation: OutOfBand);

pub const HANDSHAKE_CONNECTIONS_V1: &str = "https://didcomm.org/connections/1.0";
