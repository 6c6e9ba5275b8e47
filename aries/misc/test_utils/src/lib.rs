pub mod constants;
pub mod dev_wallet;
pub mod devsetup;
pub mod errors;
pub mod in_memory_ledger;
pub mod logger;
