pub mod engine;
pub mod pending;
pub mod registry;
pub mod router;
pub mod thread;

pub use engine::{ExchangeEngine, InboundOutcome, TimeoutReport};
pub use router::{InboundRouter, RouterEvent, RouterHandle};
pub use thread::{ProtocolKind, ThreadError, ThreadStatus};
