pub mod basic_message;
pub mod common;
pub mod connection;
pub mod discovery;
pub mod issuance;
pub mod oob;
pub mod proof_presentation;
pub mod trustping;
