//! Exponential backoff for transient control-plane failures.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{AzqrError, Result};

/// Retry settings, loaded from the `[retry]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Upper bound of the delay before retry number `attempt` (1-based).
    pub fn ceiling(&self, attempt: u32, err: &AzqrError) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        if let AzqrError::Throttled {
            retry_after: Some(hint),
        } = err
        {
            return (*hint).min(max);
        }
        let shift = attempt.saturating_sub(1).min(20);
        let exp = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(exp).min(max)
    }

    fn delay_for(&self, attempt: u32, err: &AzqrError) -> Duration {
        let ceiling = self.ceiling(attempt, err);
        if matches!(err, AzqrError::Throttled { retry_after: Some(_) }) {
            return ceiling;
        }
        let ms = ceiling.as_millis() as u64;
        if ms == 0 {
            return ceiling;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
    }

    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            attempt: 0,
        }
    }
}

/// Per-operation retry state. Call [`Backoff::wait_or_fail`] with each error;
/// it either sleeps (so the caller can try again) or hands the error back.
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl Backoff<'_> {
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub async fn wait_or_fail(&mut self, err: AzqrError, cancel: &CancelToken) -> Result<()> {
        if !err.is_retryable() || self.attempt >= self.policy.max_retries {
            return Err(err);
        }
        self.attempt += 1;
        let delay = self.policy.delay_for(self.attempt, &err);
        warn!(
            error = %err,
            attempt = self.attempt,
            max_retries = self.policy.max_retries,
            backoff_ms = delay.as_millis() as u64,
            "retrying control-plane call"
        );
        cancel.sleep(delay).await
    }
}
