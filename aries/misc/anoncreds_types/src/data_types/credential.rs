use std::collections::BTreeMap;

use crate::data_types::identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId};

/// Issued credential. Every attribute carries the issuer's signature over
/// [`attribute_signature_input`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credential {
    pub cred_id: String,
    pub schema_id: SchemaId,
    pub issuer_did: String,
    pub issuer_verkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevocationRegistryId>,
    pub values: CredentialValues,
}

impl Credential {
    pub fn attribute_names(&self) -> impl Iterator<Item = &String> {
        self.values.0.keys()
    }

    /// Only revocable credentials carry a revocation id; it equals the credential id.
    pub fn cred_rev_id(&self) -> Option<&str> {
        self.rev_reg_id.as_ref().map(|_| self.cred_id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialValues(pub BTreeMap<String, AttributeValues>);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttributeValues {
    pub raw: String,
    pub encoded: String,
    /// base64 URL_SAFE ed25519 signature
    pub signature: String,
}

/// Canonical bytes signed by the issuer for one attribute of one credential.
pub fn attribute_signature_input(
    cred_id: &str,
    schema_id: &SchemaId,
    name: &str,
    encoded: &str,
) -> Vec<u8> {
    format!("{cred_id}|{schema_id}|{name}|{encoded}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_input_binds_credential_and_attribute() {
        let schema_id = SchemaId::new_unchecked("NcYxiDXkpYi6ov5FcYDi1e:2:employee:1.0");
        let a = attribute_signature_input("cred-1", &schema_id, "age", "30");
        let b = attribute_signature_input("cred-2", &schema_id, "age", "30");
        let c = attribute_signature_input("cred-1", &schema_id, "name", "30");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cred_rev_id_only_when_revocable() {
        let mut cred: Credential = serde_json::from_value(json!({
            "cred_id": "cred-1",
            "schema_id": "NcYxiDXkpYi6ov5FcYDi1e:2:employee:1.0",
            "issuer_did": "NcYxiDXkpYi6ov5FcYDi1e",
            "issuer_verkey": "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K",
            "values": {}
        }))
        .unwrap();
        assert_eq!(cred.cred_rev_id(), None);
        cred.rev_reg_id = Some(RevocationRegistryId::new_unchecked("rev:reg:1"));
        assert_eq!(cred.cred_rev_id(), Some("cred-1"));
    }
}
