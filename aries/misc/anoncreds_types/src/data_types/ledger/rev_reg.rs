use std::collections::BTreeSet;

use crate::data_types::identifiers::rev_reg_id::RevocationRegistryId;

/// Ledger state of a revocation registry as of `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistry {
    pub id: RevocationRegistryId,
    pub timestamp: u64,
    #[serde(default)]
    pub revoked: BTreeSet<String>,
}

impl RevocationRegistry {
    pub fn new(id: RevocationRegistryId, timestamp: u64) -> Self {
        Self {
            id,
            timestamp,
            revoked: BTreeSet::new(),
        }
    }

    pub fn is_revoked(&self, cred_rev_id: &str) -> bool {
        self.revoked.contains(cred_rev_id)
    }
}
