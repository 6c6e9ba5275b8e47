use std::collections::{BTreeMap, HashMap};

use crate::data_types::{
    credential::AttributeValues,
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    nonce::Nonce,
};

/// Disclosure built by the prover. Each entry of `proofs` discloses signed attribute
/// values out of one credential; the requested referents point into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Presentation {
    /// Echo of the request nonce.
    pub nonce: Nonce,
    pub proofs: Vec<CredentialProof>,
    pub requested_proof: RequestedProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialProof {
    pub cred_id: String,
    pub schema_id: SchemaId,
    pub issuer_did: String,
    pub issuer_verkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevocationRegistryId>,
    /// Time of the revocation registry state the prover claims non-revocation against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub attributes: BTreeMap<String, AttributeValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: HashMap<String, RevealedAttribute>,
    #[serde(default)]
    pub predicates: HashMap<String, SubProofReferent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevealedAttribute {
    pub sub_proof_index: u32,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubProofReferent {
    pub sub_proof_index: u32,
}
