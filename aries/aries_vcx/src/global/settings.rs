use std::time::Duration;

use typed_builder::TypedBuilder;
use url::Url;

use crate::errors::error::{AriesVcxError, AriesVcxErrorKind, VcxResult};

pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_LEDGER_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LEDGER_BACKOFF_MS: u64 = 200;
pub const DEFAULT_TIMEOUT_TICK_MS: u64 = 1_000;

fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_ledger_max_retries() -> u32 {
    DEFAULT_LEDGER_MAX_RETRIES
}

fn default_ledger_backoff_ms() -> u64 {
    DEFAULT_LEDGER_BACKOFF_MS
}

fn default_timeout_tick_ms() -> u64 {
    DEFAULT_TIMEOUT_TICK_MS
}

/// Agent wide settings. Handed to the engine once; every exchange thread keeps a snapshot
/// of the retry policy it was created under.
#[derive(Clone, Debug, TypedBuilder, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[builder(setter(into))]
    pub label: String,
    pub service_endpoint: Url,
    #[builder(default)]
    #[serde(default)]
    pub routing_keys: Vec<String>,
    #[builder(default = DEFAULT_REPLY_TIMEOUT_MS)]
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[builder(default = DEFAULT_MAX_RETRIES)]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[builder(default = DEFAULT_LEDGER_MAX_RETRIES)]
    #[serde(default = "default_ledger_max_retries")]
    pub ledger_max_retries: u32,
    #[builder(default = DEFAULT_LEDGER_BACKOFF_MS)]
    #[serde(default = "default_ledger_backoff_ms")]
    pub ledger_backoff_ms: u64,
    #[builder(default = DEFAULT_TIMEOUT_TICK_MS)]
    #[serde(default = "default_timeout_tick_ms")]
    pub timeout_tick_ms: u64,
}

impl AgentConfig {
    pub fn from_json(config: &str) -> VcxResult<Self> {
        let config: Self = serde_json::from_str(config).map_err(|err| {
            AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidConfiguration,
                format!("Cannot parse agent config: {err}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VcxResult<()> {
        if self.label.trim().is_empty() {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidConfiguration,
                "Agent label must not be empty",
            ));
        }
        if self.reply_timeout_ms == 0 || self.timeout_tick_ms == 0 {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::InvalidConfiguration,
                "Timeouts must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            reply_timeout_ms: self.reply_timeout_ms,
            max_retries: self.max_retries,
        }
    }

    pub fn ledger_retry_policy(&self) -> LedgerRetryPolicy {
        LedgerRetryPolicy {
            max_retries: self.ledger_max_retries,
            backoff_ms: self.ledger_backoff_ms,
        }
    }

    pub fn timeout_tick(&self) -> Duration {
        Duration::from_millis(self.timeout_tick_ms)
    }
}

/// Reply expectations of one thread: how long to wait and how often to re-send.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub reply_timeout_ms: u64,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn reply_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.reply_timeout_ms).unwrap_or(i64::MAX))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerRetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl LedgerRetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}
