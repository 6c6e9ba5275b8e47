pub mod error;
mod mapping_ledger;
mod mapping_others;
mod mapping_wallet;
