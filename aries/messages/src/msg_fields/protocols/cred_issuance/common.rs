use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const CREDENTIAL_PREVIEW_TYPE: &str =
    "https://didcomm.org/issue-credential/1.0/credential-preview";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub msg_type: String,
    pub attributes: Vec<CredentialAttr>,
}

impl CredentialPreview {
    pub fn new(attributes: Vec<CredentialAttr>) -> Self {
        Self {
            msg_type: CREDENTIAL_PREVIEW_TYPE.to_owned(),
            attributes,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct CredentialAttr {
    pub name: String,
    pub value: String,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "mime-type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl CredentialAttr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            mime_type: None,
        }
    }
}
