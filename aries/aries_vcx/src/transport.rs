use std::fmt::Debug;

use async_trait::async_trait;
use url::Url;

use crate::errors::error::VcxResult;

/// Outbound delivery of packed messages. Delivery is fire-and-forget: an error means the
/// packet was not handed over, lost replies surface later as timeouts.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn send_message(&self, msg: Vec<u8>, service_endpoint: &Url) -> VcxResult<()>;
}
