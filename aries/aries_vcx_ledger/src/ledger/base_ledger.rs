use std::{fmt::Debug, sync::Arc};

use anoncreds_types::data_types::{
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    ledger::{rev_reg::RevocationRegistry, schema::Schema},
};
use async_trait::async_trait;

use crate::errors::error::VcxLedgerResult;

/// Read access to the verifiable data registry holding schemas and revocation registries.
#[async_trait]
pub trait AnoncredsLedgerRead: Debug + Send + Sync {
    async fn get_schema(&self, schema_id: &SchemaId) -> VcxLedgerResult<Schema>;

    /// State of the registry as of `to_timestamp`, or the latest state.
    async fn get_rev_reg(
        &self,
        rev_reg_id: &RevocationRegistryId,
        to_timestamp: Option<u64>,
    ) -> VcxLedgerResult<RevocationRegistry>;
}

#[async_trait]
impl<T> AnoncredsLedgerRead for Arc<T>
where
    T: AnoncredsLedgerRead + ?Sized,
{
    async fn get_schema(&self, schema_id: &SchemaId) -> VcxLedgerResult<Schema> {
        self.as_ref().get_schema(schema_id).await
    }

    async fn get_rev_reg(
        &self,
        rev_reg_id: &RevocationRegistryId,
        to_timestamp: Option<u64>,
    ) -> VcxLedgerResult<RevocationRegistry> {
        self.as_ref().get_rev_reg(rev_reg_id, to_timestamp).await
    }
}
