use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        RwLock,
    },
};

use anoncreds_types::data_types::{
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    ledger::{
        rev_reg::RevocationRegistry,
        schema::{AttributeNames, Schema},
    },
};
use aries_vcx_ledger::{
    errors::error::{VcxLedgerError, VcxLedgerResult},
    ledger::base_ledger::AnoncredsLedgerRead,
};
use async_trait::async_trait;

/// Ledger reader over in-process maps. `fail_next` makes the next calls fail with an
/// unreachable-ledger error.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    schemas: RwLock<HashMap<SchemaId, Schema>>,
    rev_regs: RwLock<HashMap<RevocationRegistryId, Vec<RevocationRegistry>>>,
    failures_left: AtomicU32,
    requests: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_schema(&self, schema: Schema) {
        if let Ok(mut schemas) = self.schemas.write() {
            schemas.insert(schema.id.clone(), schema);
        }
    }

    /// Publishes a legacy-format schema under `issuer_did` and returns it.
    pub fn create_schema(&self, issuer_did: &str, name: &str, attr_names: &[&str]) -> Schema {
        let schema = Schema {
            id: SchemaId::new_unchecked(format!("{issuer_did}:2:{name}:1.0")),
            name: name.to_owned(),
            version: "1.0".to_owned(),
            attr_names: AttributeNames::from(attr_names),
            issuer_id: issuer_did.to_owned(),
        };
        self.publish_schema(schema.clone());
        schema
    }

    /// Appends a new state of the registry; the latest entry is its current state.
    pub fn publish_rev_reg(&self, rev_reg: RevocationRegistry) {
        if let Ok(mut rev_regs) = self.rev_regs.write() {
            let history = rev_regs.entry(rev_reg.id.clone()).or_default();
            history.push(rev_reg);
            history.sort_by_key(|state| state.timestamp);
        }
    }

    pub fn revoke(&self, rev_reg_id: &RevocationRegistryId, cred_rev_id: &str, timestamp: u64) {
        let current = self.latest_rev_reg(rev_reg_id);
        let mut next = current.unwrap_or_else(|| RevocationRegistry::new(rev_reg_id.clone(), 0));
        next.timestamp = timestamp;
        next.revoked.insert(cred_rev_id.to_owned());
        self.publish_rev_reg(next);
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn latest_rev_reg(&self, rev_reg_id: &RevocationRegistryId) -> Option<RevocationRegistry> {
        self.rev_regs
            .read()
            .ok()?
            .get(rev_reg_id)
            .and_then(|history| history.last().cloned())
    }

    fn check_reachable(&self) -> VcxLedgerResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if outage {
            return Err(VcxLedgerError::IOError(
                "in-memory ledger is simulating an outage".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AnoncredsLedgerRead for InMemoryLedger {
    async fn get_schema(&self, schema_id: &SchemaId) -> VcxLedgerResult<Schema> {
        self.check_reachable()?;
        self.schemas
            .read()
            .map_err(|err| VcxLedgerError::UnknownError(err.to_string()))?
            .get(schema_id)
            .cloned()
            .ok_or(VcxLedgerError::LedgerItemNotFound)
    }

    async fn get_rev_reg(
        &self,
        rev_reg_id: &RevocationRegistryId,
        to_timestamp: Option<u64>,
    ) -> VcxLedgerResult<RevocationRegistry> {
        self.check_reachable()?;
        let rev_regs = self
            .rev_regs
            .read()
            .map_err(|err| VcxLedgerError::UnknownError(err.to_string()))?;
        let history = rev_regs
            .get(rev_reg_id)
            .ok_or(VcxLedgerError::LedgerItemNotFound)?;
        let state = match to_timestamp {
            Some(to) => history.iter().rev().find(|state| state.timestamp <= to),
            None => history.last(),
        };
        state.cloned().ok_or(VcxLedgerError::LedgerItemNotFound)
    }
}
