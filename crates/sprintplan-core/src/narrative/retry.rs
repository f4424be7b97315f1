//! Capped exponential backoff for narrative requests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::NarrativeError;

/// Retry schedule for transient narrative failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1 = the wait after the first failure).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `sleep` is called between attempts; production code passes
    /// `std::thread::sleep`.
    pub fn run<T, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, NarrativeError>
    where
        F: FnMut(u32) -> Result<T, NarrativeError>,
        S: FnMut(Duration),
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, "narrative attempt failed, retrying: {e}");
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// [`RetryPolicy::run`] with a real thread sleep.
    pub fn run_blocking<T, F>(&self, op: F) -> Result<T, NarrativeError>
    where
        F: FnMut(u32) -> Result<T, NarrativeError>,
    {
        self.run(op, std::thread::sleep)
    }
}
