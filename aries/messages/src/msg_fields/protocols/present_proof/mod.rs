//! Module containing the `present proof` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0037-present-proof/README.md>).

pub mod ack;
pub mod presentation;
pub mod request;

use derive_more::From;

use self::{ack::AckPresentation, presentation::Presentation, request::RequestPresentation};
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum PresentProof {
    RequestPresentation(RequestPresentation),
    Presentation(Presentation),
    Ack(AckPresentation),
}

transit_to_aries_msg!(RequestPresentation: PresentProof);
transit_to_aries_msg!(Presentation: PresentProof);
transit_to_aries_msg!(AckPresentation: PresentProof);
