//! Module containing the decorators used in Aries messages.
//! Decorators are generic fields that can be attached to messages of any protocol.
pub mod attachment;
pub mod please_ack;
pub mod thread;
pub mod timing;
