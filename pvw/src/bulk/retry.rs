//! Retry policy for Purview calls
//!
//! Exponential backoff with optional equal jitter. A `Retry-After` supplied
//! by the server replaces the computed delay (still capped at the maximum).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::client::ApiError;
use crate::config::RetryConfig;

/// When and how often a failed call is attempted again
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first; at least 1
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: 2.0,
            jitter: config.jitter,
        }
    }
}

/// Result of a retried call plus how many attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, ApiError>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Deterministic delay after the given failed attempt (1-based), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exp);
        Duration::from_millis(millis.min(self.max_backoff.as_millis() as f64) as u64)
    }

    /// Delay to wait after a failed attempt
    pub fn delay_for(&self, attempt: u32, error: &ApiError) -> Duration {
        if let Some(retry_after) = error.retry_after() {
            return retry_after.min(self.max_backoff);
        }

        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }

        // Equal jitter: half fixed, half random
        let half = base.as_millis() as u64 / 2;
        let extra = rand::rng().random_range(0..=half);
        Duration::from_millis(half + extra)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        debug!(%op_name, max_attempts = self.max_attempts, "RetryPolicy::run: called");
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    debug!(%op_name, attempt, "RetryPolicy::run: success");
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    let reason = if e.is_rate_limit() { "throttled" } else { "transient error" };
                    warn!(
                        %op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after {}",
                        reason
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(%op_name, attempt, error = %e, "RetryPolicy::run: giving up");
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
