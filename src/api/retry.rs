//! Bounded fixed-delay retry for collaborator calls.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use backoff::backoff::Backoff;
use tracing::warn;

/// How many times to try a call and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Backoff schedule for this policy.
    pub fn backoff(&self) -> FixedBackoff {
        FixedBackoff {
            delay: self.delay,
            max_retries: self.max_attempts.saturating_sub(1),
            retries: 0,
        }
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// Every error is treated as transient; the last one is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        backoff::future::retry_notify(
            self.backoff(),
            || {
                let fut = op();
                async move { fut.await.map_err(backoff::Error::transient) }
            },
            |err: anyhow::Error, wait: Duration| {
                attempt += 1;
                warn!(
                    call = what,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    retry_in_ms = wait.as_millis() as u64,
                    error = %err,
                    "Call failed, retrying"
                );
            },
        )
        .await
    }
}

/// Constant delay, giving up after a fixed number of retries.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
    max_retries: u32,
    retries: u32,
}

impl Backoff for FixedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.delay)
    }

    fn reset(&mut self) {
        self.retries = 0;
    }
}
