use std::future::Future;

use aries_vcx_ledger::errors::error::VcxLedgerResult;

use crate::{errors::error::prelude::*, global::settings::LedgerRetryPolicy};

/// Runs a ledger call, retrying transient failures up to `policy.max_retries` times with
/// exponential backoff. Non-transient failures are returned right away.
pub async fn with_ledger_retry<T, F, Fut>(
    policy: &LedgerRetryPolicy,
    operation: &str,
    mut call: F,
) -> VcxResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VcxLedgerResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                warn!(
                    "{operation}: ledger unreachable ({err}), retry {attempt}/{} in {delay:?}",
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    error!("{operation}: ledger still unreachable after {attempt} retries: {err}");
                }
                return Err(err.into());
            }
        }
    }
}
