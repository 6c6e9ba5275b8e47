use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    decorators::{please_ack::PleaseAck, thread::Thread, timing::Timing},
    msg_parts::MsgParts,
};

pub const ED25519_SIGNATURE_TYPE: &str =
    "https://didcomm.org/signature/1.0/ed25519Sha512_single";

pub type Response = MsgParts<ResponseContent, ResponseDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ResponseContent {
    #[serde(rename = "connection~sig")]
    pub connection_sig: ConnectionSignature,
}

/// The `connection~sig` field decorator: base64url signed `ConnectionData`, prefixed by an
/// 8 byte big-endian timestamp.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ConnectionSignature {
    #[serde(rename = "@type")]
    #[builder(default = ED25519_SIGNATURE_TYPE.to_owned())]
    pub msg_type: String,
    pub signature: String,
    pub sig_data: String,
    pub signer: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ResponseDecorators {
    #[serde(rename = "~thread")]
    pub thread: Thread,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~please_ack")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub please_ack: Option<PleaseAck>,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        decorators::{please_ack::tests::make_minimal_please_ack, thread::tests::make_extended_thread},
        misc::test_utils,
        msg_types::MessageKind,
    };

    #[test]
    fn test_extended_conn_response() {
        let conn_sig = ConnectionSignature::builder()
            .signature("test_signature".to_owned())
            .sig_data("test_sig_data".to_owned())
            .signer("test_signer".to_owned())
            .build();
        let content = ResponseContent::builder().connection_sig(conn_sig).build();

        let decorators = ResponseDecorators::builder()
            .thread(make_extended_thread())
            .please_ack(make_minimal_please_ack())
            .build();

        let expected = json!({
            "connection~sig": {
                "@type": ED25519_SIGNATURE_TYPE,
                "signature": "test_signature",
                "sig_data": "test_sig_data",
                "signer": "test_signer",
            },
            "~thread": decorators.thread,
            "~please_ack": decorators.please_ack,
        });

        test_utils::test_msg(
            content,
            decorators,
            MessageKind::ConnectionResponse,
            expected,
        );
    }
}
