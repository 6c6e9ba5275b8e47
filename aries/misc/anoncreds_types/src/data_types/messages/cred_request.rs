use crate::data_types::{identifiers::schema_id::SchemaId, nonce::Nonce};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialRequest {
    pub prover_did: String,
    pub schema_id: SchemaId,
    /// Echo of the offer nonce.
    pub nonce: Nonce,
}
