pub mod credentials;
pub mod ledger;
pub mod proofs;
pub mod signing;
