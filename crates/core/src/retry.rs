//! Bounded fixed-delay retry.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::RetryConfig;
use crate::metrics::RETRY_ATTEMPTS;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

/// All attempts of an operation failed.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct RetryError<E: std::error::Error + 'static> {
    pub operation: String,
    pub attempts: u32,
    /// The error of the last attempt.
    #[source]
    pub source: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// Sleeps only between attempts, never after the last one.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= self.max_attempts => {
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        self.delay
                    );
                    RETRY_ATTEMPTS.with_label_values(&[operation]).inc();
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }
}
