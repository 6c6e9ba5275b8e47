use crate::impl_ledger_identifier;

impl_ledger_identifier!(RevocationRegistryId, LEGACY_REV_REG_IDENTIFIER);
