//! Retry policy for outbound peer calls.
//!
//! # Responsibilities
//! - Bound the number of attempts per call
//! - Sleep a jittered exponential backoff between attempts
//!
//! # Design Decisions
//! - Every error is retried; the caller decides what counts as failure
//!   (a non-2xx reply is mapped to an error before it gets here)
//! - The last error is returned unchanged once attempts are exhausted

use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay after the given failed attempt (1-based): the base delay
    /// doubled for each earlier failure, capped at `max_delay_ms`, plus up to
    /// 10% random jitter.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        if failed_attempt == 0 {
            return Duration::ZERO;
        }
        let doublings = (failed_attempt - 1).min(63);
        let capped = self
            .base_delay_ms
            .saturating_mul(1u64 << doublings)
            .min(self.max_delay_ms);
        let jitter = match capped / 10 {
            0 => 0,
            spread => rand::thread_rng().gen_range(0..spread),
        };
        Duration::from_millis(capped + jitter)
    }

    /// Run `op` until it succeeds or attempts run out. `op` receives the
    /// 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    tracing::debug!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
