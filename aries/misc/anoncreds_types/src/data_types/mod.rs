pub mod identifiers;
pub mod ledger;
pub mod messages;
pub mod nonce;
pub mod pres_request;
pub mod presentation;
pub mod credential;

mod macros;
