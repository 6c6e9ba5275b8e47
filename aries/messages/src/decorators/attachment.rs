use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::error::{MessageCodecError, MessageCodecResult};

/// Struct representing the `~attach` decorator from its [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/concepts/0017-attachments/README.md>).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TypedBuilder)]
pub struct Attachment {
    #[builder(default, setter(strip_option))]
    #[serde(rename = "@id")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "mime-type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub data: AttachmentData,
    #[builder(default)]
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl Attachment {
    /// Serializes `payload` into a base64 encoded JSON attachment.
    pub fn from_payload<T: Serialize>(id: impl Into<String>, payload: &T) -> MessageCodecResult<Self> {
        let json = serde_json::to_vec(payload)?;
        Ok(Self::builder()
            .id(id.into())
            .mime_type("application/json".to_owned())
            .data(AttachmentData {
                base64: Some(STANDARD.encode(json)),
                json: None,
            })
            .build())
    }

    pub fn json(id: impl Into<String>, value: Value) -> Self {
        Self::builder()
            .id(id.into())
            .mime_type("application/json".to_owned())
            .data(AttachmentData {
                base64: None,
                json: Some(value),
            })
            .build()
    }

    pub fn decode_payload<T: DeserializeOwned>(&self) -> MessageCodecResult<T> {
        match (&self.data.base64, &self.data.json) {
            (Some(base64), _) => {
                let bytes = STANDARD
                    .decode(base64)
                    .map_err(|err| MessageCodecError::Attachment(err.to_string()))?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            (None, Some(json)) => Ok(serde_json::from_value(json.clone())?),
            (None, None) => Err(MessageCodecError::Attachment(
                "attachment carries neither base64 nor json data".to_owned(),
            )),
        }
    }
}

/// Decodes the first attachment of a list, the position every single-payload protocol uses.
pub fn decode_first<T: DeserializeOwned>(attachments: &[Attachment]) -> MessageCodecResult<T> {
    attachments
        .first()
        .ok_or_else(|| MessageCodecError::Attachment("attachment list is empty".to_owned()))?
        .decode_payload()
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;

    use super::*;

    pub fn make_extended_attachment() -> Attachment {
        Attachment::json("test_attachment", json!({"field": "value"}))
    }

    #[test]
    fn test_base64_payload_roundtrip() {
        let payload = json!({"schema_id": "abc", "values": [1, 2, 3]});
        let attachment = Attachment::from_payload("a-1", &payload).unwrap();
        assert!(attachment.data.json.is_none());

        let decoded: Value = attachment.decode_payload().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_json_attachment_decodes() {
        let decoded: Value = make_extended_attachment().decode_payload().unwrap();
        assert_eq!(decoded["field"], "value");
    }

    #[test]
    fn test_empty_attachment_data_fails() {
        let attachment = Attachment::builder()
            .data(AttachmentData {
                base64: None,
                json: None,
            })
            .build();
        assert!(matches!(
            attachment.decode_payload::<Value>(),
            Err(MessageCodecError::Attachment(_))
        ));
        assert!(decode_first::<Value>(&[]).is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(make_extended_attachment()).unwrap();
        assert_eq!(value["@id"], "test_attachment");
        assert_eq!(value["mime-type"], "application/json");
    }
}
