//! Exponential backoff retry policy.

use std::future::Future;
use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Caps exponential growth.
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry.
    pub multiplier: f64,
    /// Adds `jitter_fraction * backoff / 2` on top of each delay (0.0 = none).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Stateless retry policy. Computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before the `attempt`-th retry (1-based), `None` once
    /// `max_retries` is exceeded.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        let capped = base_ms.min(cap_ms);
        let jitter_ms = capped * self.config.jitter_fraction * 0.5;
        Some(Duration::from_millis((capped + jitter_ms) as u64))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget runs out. The last error is returned.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut op: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => match self.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            op = label,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        if self.config.max_retries > 0 {
                            tracing::error!(op = label, attempt, error = %e, "max retries exceeded");
                        }
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}
