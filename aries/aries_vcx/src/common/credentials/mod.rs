use std::collections::BTreeMap;

use anoncreds_types::data_types::{
    credential::Credential,
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
};
use messages::msg_fields::protocols::cred_issuance::common::CredentialAttr;

use crate::errors::error::prelude::*;

pub mod encoding;

/// Issuance snapshot shared by issuer and holder. Immutable once finalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialRecord {
    pub thread_id: String,
    pub schema_id: SchemaId,
    pub rev_reg_id: Option<RevocationRegistryId>,
    pub attributes: BTreeMap<String, String>,
    pub credential: Option<Credential>,
    pub finalized: bool,
}

impl CredentialRecord {
    pub fn new(
        thread_id: &str,
        schema_id: SchemaId,
        rev_reg_id: Option<RevocationRegistryId>,
        attributes: &[CredentialAttr],
    ) -> Self {
        Self {
            thread_id: thread_id.to_owned(),
            schema_id,
            rev_reg_id,
            attributes: attributes
                .iter()
                .map(|attr| (attr.name.clone(), attr.value.clone()))
                .collect(),
            credential: None,
            finalized: false,
        }
    }

    pub fn set_credential(&mut self, credential: Credential) -> VcxResult<()> {
        if self.finalized {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidState,
                format!("Credential record of thread {} is finalized", self.thread_id),
            ));
        }
        self.credential = Some(credential);
        Ok(())
    }

    pub fn finalize(&mut self) {
        if !self.finalized {
            debug!("Finalizing credential record of thread {}", self.thread_id);
        }
        self.finalized = true;
    }

    /// Finalized records carrying a credential are usable for presentations.
    pub fn usable_credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|_| self.finalized)
    }
}

#[cfg(test)]
mod unit_tests {
    use anoncreds_types::data_types::credential::CredentialValues;

    use super::*;

    fn credential() -> Credential {
        Credential {
            cred_id: "cred-1".to_owned(),
            schema_id: SchemaId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:2:person:1.0"),
            issuer_did: "V4SGRU86Z58d6TV7PBUe6f".to_owned(),
            issuer_verkey: "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K".to_owned(),
            rev_reg_id: None,
            values: CredentialValues::default(),
        }
    }

    #[test]
    fn test_record_is_frozen_after_finalize() {
        let mut record = CredentialRecord::new(
            "thread-1",
            SchemaId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:2:person:1.0"),
            None,
            &[CredentialAttr::new("name", "Alice")],
        );
        assert_eq!(record.attributes["name"], "Alice");
        record.set_credential(credential()).unwrap();
        assert!(record.usable_credential().is_none());

        record.finalize();
        assert!(record.usable_credential().is_some());
        assert_eq!(
            record.set_credential(credential()).unwrap_err().kind(),
            AriesVcxErrorKind::InvalidState
        );
    }
}
