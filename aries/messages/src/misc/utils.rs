/// Implements `From<$inner>` for [`crate::AriesMessage`] through the protocol enum `$proto`.
macro_rules! transit_to_aries_msg {
    ($inner:ty: $($proto:ident)::+) => {
        impl From<$inner> for $crate::AriesMessage {
            fn from(value: $inner) -> Self {
                Self::from($($proto)::+::from(value))
            }
        }
    };
}

pub(crate) use transit_to_aries_msg;
