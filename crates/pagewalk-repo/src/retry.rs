//! Retry policy for optimistic updates.

use std::future::Future;
use std::time::Duration;

use crate::{Result, TRACING_TARGET_RETRY};

/// Configuration for retry behavior on failed operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            ..Self::default()
        }
    }

    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Set the maximum backoff duration.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate the backoff duration for a given attempt number.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_millis = (self.initial_backoff.as_millis() as f64)
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_millis as u64);
        backoff.min(self.max_backoff)
    }

    /// Retry an async operation according to this configuration.
    ///
    /// The operation receives the zero-based attempt number. Errors that are
    /// not [retryable](crate::Error::is_retryable) are returned immediately;
    /// otherwise the error of the last attempt is returned.
    pub async fn retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::debug!(
                    target: TRACING_TARGET_RETRY,
                    error = %err,
                    "Non-retryable error, failing immediately"
                );
                return Err(err);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    target: TRACING_TARGET_RETRY,
                    attempts = attempt + 1,
                    error = %err,
                    "Retry attempts exhausted"
                );
                return Err(err);
            }

            let backoff = self.calculate_backoff(attempt);
            tracing::debug!(
                target: TRACING_TARGET_RETRY,
                attempt = attempt + 1,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis(),
                "Retrying operation after backoff"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
