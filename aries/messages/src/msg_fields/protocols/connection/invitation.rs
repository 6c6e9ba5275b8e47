use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{decorators::timing::Timing, msg_parts::MsgParts};

/// Pairwise invitation: single recipient, inline service.
pub type Invitation = MsgParts<InvitationContent, InvitationDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct InvitationContent {
    pub label: String,
    pub recipient_keys: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub routing_keys: Vec<String>,
    /// Kept as text, endpoint validity is a protocol decision.
    pub service_endpoint: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, TypedBuilder)]
pub struct InvitationDecorators {
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{misc::test_utils, msg_types::MessageKind};

    #[test]
    fn test_minimal_conn_invite() {
        let content = InvitationContent::builder()
            .label("test_label".to_owned())
            .recipient_keys(vec!["8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K".to_owned()])
            .service_endpoint("https://dummy.dummy/dummy".to_owned())
            .build();

        let expected = json!({
            "label": content.label,
            "recipientKeys": content.recipient_keys,
            "routingKeys": [],
            "serviceEndpoint": content.service_endpoint,
        });

        test_utils::test_msg(
            content,
            InvitationDecorators::default(),
            MessageKind::ConnectionInvitation,
            expected,
        );
    }
}
