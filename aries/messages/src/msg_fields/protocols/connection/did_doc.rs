//! DID document in the legacy Aries format carried by `connections/1.0` messages.

use public_key::Key;
use serde::{Deserialize, Serialize};

use crate::error::{MessageCodecError, MessageCodecResult};

pub const CONTEXT: &str = "https://w3id.org/did/v1";
pub const KEY_TYPE: &str = "Ed25519VerificationKey2018";
pub const KEY_AUTHENTICATION_TYPE: &str = "Ed25519SignatureAuthentication2018";
pub const SERVICE_TYPE: &str = "IndyAgent";
pub const SERVICE_SUFFIX: &str = "indy";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AriesDidDoc {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    #[serde(rename = "publicKey")]
    pub public_key: Vec<Ed25519PublicKey>,
    #[serde(default)]
    pub authentication: Vec<Authentication>,
    pub service: Vec<AriesService>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Ed25519PublicKey {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(rename = "publicKeyBase58")]
    pub public_key_base_58: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AriesService {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

impl AriesDidDoc {
    pub fn new(
        did: impl Into<String>,
        service_endpoint: impl Into<String>,
        recipient_keys: Vec<String>,
        routing_keys: Vec<String>,
    ) -> Self {
        let did = did.into();
        let mut did_doc = Self {
            context: CONTEXT.to_owned(),
            id: did.clone(),
            public_key: vec![],
            authentication: vec![],
            service: vec![AriesService {
                id: format!("did:example:123456789abcdefghi;{SERVICE_SUFFIX}"),
                type_: SERVICE_TYPE.to_owned(),
                priority: 0,
                recipient_keys: vec![],
                routing_keys,
                service_endpoint: service_endpoint.into(),
            }],
        };
        did_doc.set_recipient_keys(recipient_keys);
        did_doc
    }

    fn set_recipient_keys(&mut self, recipient_keys: Vec<String>) {
        for (idx, key_in_base58) in recipient_keys.into_iter().enumerate() {
            let key_reference = format!("{}#{}", self.id, idx + 1);

            self.public_key.push(Ed25519PublicKey {
                id: key_reference.clone(),
                type_: KEY_TYPE.to_owned(),
                controller: self.id.clone(),
                public_key_base_58: key_in_base58.clone(),
            });
            self.authentication.push(Authentication {
                type_: KEY_AUTHENTICATION_TYPE.to_owned(),
                public_key: key_reference,
            });
            if let Some(service) = self.service.get_mut(0) {
                service.recipient_keys.push(key_in_base58);
            }
        }
    }

    /// Recipient keys of the first service, references (`did#1`) resolved to key values.
    pub fn recipient_keys(&self) -> MessageCodecResult<Vec<String>> {
        let Some(service) = self.service.first() else {
            return Ok(Vec::new());
        };
        service
            .recipient_keys
            .iter()
            .map(|entry| self.resolve_key(entry))
            .collect()
    }

    pub fn routing_keys(&self) -> Vec<String> {
        self.service
            .first()
            .map(|service| service.routing_keys.clone())
            .unwrap_or_default()
    }

    pub fn service_endpoint(&self) -> Option<&str> {
        self.service
            .first()
            .map(|service| service.service_endpoint.as_str())
    }

    pub fn validate(&self) -> MessageCodecResult<()> {
        if self.context != CONTEXT {
            return Err(MessageCodecError::InvalidDidDoc(format!(
                "Unsupported @context value: {:?}",
                self.context
            )));
        }
        if self.id.is_empty() {
            return Err(MessageCodecError::InvalidDidDoc("id is empty".to_owned()));
        }
        let recipient_keys = self.recipient_keys()?;
        if recipient_keys.is_empty() {
            return Err(MessageCodecError::InvalidDidDoc(
                "no recipient keys".to_owned(),
            ));
        }
        for key in recipient_keys.iter().chain(self.routing_keys().iter()) {
            Key::from_verkey_or_did_key(key)
                .map_err(|err| MessageCodecError::InvalidDidDoc(format!("{key}: {err}")))?;
        }
        Ok(())
    }

    fn resolve_key(&self, key_value_or_reference: &str) -> MessageCodecResult<String> {
        let public_key = if key_value_or_reference.contains('#') {
            self.public_key
                .iter()
                .find(|key| key.id == key_value_or_reference)
        } else {
            self.public_key
                .iter()
                .find(|key| key.public_key_base_58 == key_value_or_reference)
        };
        match public_key {
            Some(key) if key.type_ == KEY_TYPE => Ok(key.public_key_base_58.clone()),
            Some(key) => Err(MessageCodecError::InvalidDidDoc(format!(
                "unsupported key type {} for {}",
                key.type_, key.id
            ))),
            // bare verkeys without a publicKey entry are accepted as-is
            None if !key_value_or_reference.contains('#') => {
                Ok(key_value_or_reference.to_owned())
            }
            None => Err(MessageCodecError::InvalidDidDoc(format!(
                "unresolvable key reference {key_value_or_reference}"
            ))),
        }
    }
}
