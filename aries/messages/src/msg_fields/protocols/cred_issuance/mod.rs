//! Module containing the `issue credential` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0036-issue-credential/README.md>).

pub mod ack;
pub mod common;
pub mod issue_credential;
pub mod offer_credential;
pub mod request_credential;

use derive_more::From;

use self::{
    ack::AckCredential, issue_credential::IssueCredential, offer_credential::OfferCredential,
    request_credential::RequestCredential,
};
use crate::misc::utils::transit_to_aries_msg;

#[derive(Clone, Debug, From, PartialEq)]
pub enum CredentialIssuance {
    OfferCredential(OfferCredential),
    RequestCredential(RequestCredential),
    IssueCredential(IssueCredential),
    Ack(AckCredential),
}

transit_to_aries_msg!(OfferCredential: CredentialIssuance);
transit_to_aries_msg!(RequestCredential: CredentialIssuance);
transit_to_aries_msg!(IssueCredential: CredentialIssuance);
transit_to_aries_msg!(AckCredential: CredentialIssuance);
