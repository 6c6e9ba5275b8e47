use anoncreds_types::data_types::{
    identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
    ledger::{rev_reg::RevocationRegistry, schema::Schema},
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;

use self::retry::with_ledger_retry;
use crate::{errors::error::prelude::*, global::settings::LedgerRetryPolicy};

pub mod retry;

pub async fn resolve_schema(
    ledger: &dyn AnoncredsLedgerRead,
    policy: &LedgerRetryPolicy,
    schema_id: &SchemaId,
) -> VcxResult<Schema> {
    trace!("resolve_schema >>> schema_id: {}", schema_id);
    with_ledger_retry(policy, "get_schema", || ledger.get_schema(schema_id))
        .await
        .map_err(|err| err.extend(format!("Cannot resolve schema {schema_id}")))
}

/// Registry state as of `to_timestamp` (latest when `None`). Any failure, exhausted retries
/// included, surfaces as `RevocationRegistryUnavailable`.
pub async fn resolve_rev_reg(
    ledger: &dyn AnoncredsLedgerRead,
    policy: &LedgerRetryPolicy,
    rev_reg_id: &RevocationRegistryId,
    to_timestamp: Option<u64>,
) -> VcxResult<RevocationRegistry> {
    trace!(
        "resolve_rev_reg >>> rev_reg_id: {}, to_timestamp: {:?}",
        rev_reg_id,
        to_timestamp
    );
    with_ledger_retry(policy, "get_rev_reg", || {
        ledger.get_rev_reg(rev_reg_id, to_timestamp)
    })
    .await
    .map_err(|err| {
        AriesVcxError::from_msg(
            AriesVcxErrorKind::RevocationRegistryUnavailable,
            format!("Cannot resolve revocation registry {rev_reg_id}: {err}"),
        )
    })
}
