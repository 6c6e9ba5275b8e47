#![allow(clippy::result_large_err)]
#![allow(clippy::large_enum_variant)]

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

pub extern crate messages;

pub use aries_vcx_ledger;
pub use aries_vcx_wallet;

#[macro_use]
pub mod handlers;

pub mod common;
pub mod errors;
pub mod global;
pub mod protocols;
pub mod transport;
pub mod utils;
