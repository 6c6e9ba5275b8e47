pub mod encryption_envelope;
