//! Module containing the `acks` messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0015-acks/README.md>).

pub mod ack;

use derive_more::From;

use self::ack::Ack;
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum Notification {
    Ack(Ack),
}

transit_to_aries_msg!(Ack: Notification);
