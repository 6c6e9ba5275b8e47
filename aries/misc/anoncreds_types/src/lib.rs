extern crate log;

#[macro_use]
extern crate serde;

#[cfg(test)]
#[macro_use]
extern crate serde_json;

mod error;
pub use self::error::{Error, ErrorKind, Result};

pub mod utils;

pub mod data_types;
