//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound request settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Retries after the first attempt
    pub retry: u32,
    /// Status codes worth retrying
    pub retry_on: Vec<u16>,
    /// Backoff unit; retry `n` sleeps `n * backoff_base_ms`
    pub backoff_base_ms: u64,
    /// Calls allowed to start per throttle interval
    pub throttle_concurrency: u32,
    /// Throttle window length (milliseconds)
    pub throttle_interval_ms: u64,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry: 2,
            retry_on: vec![408, 502, 503, 504],
            backoff_base_ms: 2_000,
            throttle_concurrency: 10,
            throttle_interval_ms: 1_000,
            timeout_secs: 30,
            user_agent: format!("ferry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GatewayConfig {
    /// Set the retry count
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the retryable status codes
    pub fn with_retry_on(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_on = codes.into_iter().collect();
        self
    }

    /// Set the backoff unit
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    /// Set the throttle quota
    pub fn with_throttle(mut self, concurrency: u32, interval: Duration) -> Self {
        self.throttle_concurrency = concurrency;
        self.throttle_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    /// Delay before retry number `attempt` (1-based): linear in the attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn is_retryable(&self, code: u16) -> bool {
        self.retry_on.contains(&code)
    }
}
