pub mod base_ledger;
pub mod response_cacher;
