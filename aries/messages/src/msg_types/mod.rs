//! Message type URIs: `<prefix><protocol>/<major>.<minor>/<name>`.

mod kind;
pub mod registry;

pub use kind::{MessageKind, Protocol};

use crate::error::MsgTypeError;

pub const DIDCOMM_PREFIX: &str = "https://didcomm.org/";
pub const DID_SOV_PREFIX: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/";

/// Borrowed, parsed form of an `@type` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageType<'a> {
    pub protocol: &'a str,
    pub major: u8,
    pub minor: u8,
    pub kind: &'a str,
}

impl<'a> TryFrom<&'a str> for MessageType<'a> {
    type Error = MsgTypeError;

    fn try_from(msg_type: &'a str) -> Result<Self, Self::Error> {
        let rest = msg_type
            .strip_prefix(DIDCOMM_PREFIX)
            .or_else(|| msg_type.strip_prefix(DID_SOV_PREFIX))
            .ok_or_else(|| MsgTypeError::unknown_prefix(msg_type))?;

        let mut parts = rest.split('/');
        let (Some(protocol), Some(version), Some(kind), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(MsgTypeError::invalid_format(msg_type));
        };

        if protocol.is_empty() || kind.is_empty() {
            return Err(MsgTypeError::invalid_format(msg_type));
        }

        let (major, minor) = version
            .split_once('.')
            .ok_or_else(|| MsgTypeError::InvalidVersion(version.to_owned()))?;
        let parse = |v: &str| {
            v.parse::<u8>()
                .map_err(|_| MsgTypeError::InvalidVersion(version.to_owned()))
        };

        Ok(Self {
            protocol,
            major: parse(major)?,
            minor: parse(minor)?,
            kind,
        })
    }
}
