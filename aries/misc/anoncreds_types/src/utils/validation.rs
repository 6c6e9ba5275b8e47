use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

pub static URI_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\+\-\.]+:.+$").unwrap());

/// Unqualified (legacy) DID: 16 bytes of a verkey in base58.
pub static LEGACY_DID_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[1-9A-HJ-NP-Za-km-z]{21,22}$").unwrap());

pub static LEGACY_SCHEMA_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[1-9A-HJ-NP-Za-km-z]{21,22}:2:.+:[0-9.]+$").unwrap());

pub static LEGACY_REV_REG_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[1-9A-HJ-NP-Za-km-z]{21,22}:4:[1-9A-HJ-NP-Za-km-z]{21,22}:3:CL:.+:CL_ACCUM:.+$")
        .unwrap()
});

/// Trait for data types which need validation after being loaded from external sources.
pub trait Validatable {
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}
