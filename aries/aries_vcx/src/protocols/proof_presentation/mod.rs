pub mod prover;
pub mod verifier;
