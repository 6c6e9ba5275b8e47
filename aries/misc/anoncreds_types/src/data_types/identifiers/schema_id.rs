use crate::impl_ledger_identifier;

impl_ledger_identifier!(SchemaId, LEGACY_SCHEMA_IDENTIFIER);
