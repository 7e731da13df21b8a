//! Retry with exponential backoff.
//!
//! The delay before retry `n` (1-based) is `base_delay ^ n` seconds, capped at
//! `max_delay`. A policy with `max_retries = 3` runs an operation at most four times.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// No retries and no waiting.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64().powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Runs `action` until it succeeds or the retry budget is spent. The closure
    /// receives the 1-based attempt number. Returns the last error on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut action: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match action(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(err);
                }
            }
        }
    }
}
