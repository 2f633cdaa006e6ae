//! Retry policy for transient server failures
//!
//! The policy mirrors the classic "backoff factor" scheme: the k-th retry
//! waits `factor * 2^(k-1)` seconds, capped at a maximum.

use crate::config::HttpConfig;
use std::time::Duration;

/// Bounded exponential backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Base backoff factor
    pub backoff_factor: Duration,

    /// Cap for a single sleep
    pub backoff_max: Duration,

    /// Status codes considered transient
    pub statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Builds the policy from the `[http]` section
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: Duration::from_secs_f64(config.backoff_factor),
            backoff_max: Duration::from_secs_f64(config.backoff_max),
            statuses: config.retry_statuses.clone(),
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_factor: Duration::ZERO,
            backoff_max: Duration::ZERO,
            statuses: Vec::new(),
        }
    }

    /// Returns true if a response with this status should be retried
    ///
    /// Success and client-error codes are never retried, whatever the list says.
    pub fn should_retry_status(&self, status: u16) -> bool {
        status >= 500 && self.statuses.contains(&status)
    }

    /// Sleep before the given retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(31);
        let delay = self.backoff_factor.as_secs_f64() * f64::from(1u32 << exponent);
        Duration::from_secs_f64(delay.min(self.backoff_max.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}
