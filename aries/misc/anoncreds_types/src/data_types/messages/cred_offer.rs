use crate::data_types::{
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    nonce::Nonce,
};

/// Issuer's commitment to a schema, carried in the offer attachment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevocationRegistryId>,
    pub issuer_did: String,
    pub nonce: Nonce,
}
