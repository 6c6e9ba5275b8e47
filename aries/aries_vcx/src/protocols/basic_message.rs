use chrono::{DateTime, Utc};
use messages::{
    decorators::timing::Timing,
    msg_fields::protocols::basic_message::{
        BasicMessage, BasicMessageContent, BasicMessageDecorators,
    },
};
use uuid::Uuid;

pub fn build_basic_message(content: &str) -> BasicMessage {
    BasicMessage::builder()
        .id(Uuid::new_v4().to_string())
        .content(
            BasicMessageContent::builder()
                .content(content.to_owned())
                .sent_time(Utc::now())
                .build(),
        )
        .decorators(
            BasicMessageDecorators::builder()
                .timing(Timing::now())
                .build(),
        )
        .build()
}

/// A basic message received over a connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub connection_id: String,
    pub message_id: String,
    pub content: String,
    pub sent_time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl ReceivedMessage {
    pub fn new(connection_id: &str, message: &BasicMessage) -> Self {
        Self {
            connection_id: connection_id.to_owned(),
            message_id: message.id.clone(),
            content: message.content.content.clone(),
            sent_time: message.content.sent_time,
            received_at: Utc::now(),
        }
    }
}
