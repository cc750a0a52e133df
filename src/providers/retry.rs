//! Timeout and exponential backoff around remote calls.
//!
//! Only errors for which [`ReminderBotError::is_transient`] holds are retried;
//! everything else is returned after the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::{ReminderBotError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = fail immediately).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
    /// Upper bound for each single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_retries: config.max_retries(),
            initial_delay: config.initial_backoff(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keeps rand out of the dependency tree.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ReminderBotError::Timeout(format!(
                    "{operation} exceeded {:?}",
                    self.timeout
                ))),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
