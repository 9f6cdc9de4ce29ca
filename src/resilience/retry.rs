// src/resilience/retry.rs
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Explicit retry policy, applied at each external call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(c: RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base_delay: Duration::from_millis(c.base_delay_ms),
            max_delay: Duration::from_millis(c.max_delay_ms),
            exponential: c.exponential,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential: false,
        }
    }

    /// Delay after the `attempt`-th failure (1-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let d = if self.exponential {
            let shift = attempt.saturating_sub(1).min(16);
            self.base_delay.saturating_mul(1u32 << shift)
        } else {
            self.base_delay
        };
        d.min(self.max_delay)
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or attempts run out.
    pub async fn run<T, F, Fut, R>(&self, op_name: &str, mut op: F, retryable: R) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: Fn(&Error) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        target: "providers",
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Transient provider failures are retryable; config and parse errors are not.
pub fn is_transient(e: &Error) -> bool {
    matches!(e, Error::Provider(_) | Error::Io(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(n: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: n,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            exponential: true,
        }
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            exponential: true,
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(350));
        let flat = RetryPolicy { exponential: false, ..p };
        assert_eq!(flat.delay_for(4), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let c = &calls;
        let out = fast(3)
            .run(
                "t",
                move || async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Provider("flaky".into()))
                    } else {
                        Ok(7)
                    }
                },
                is_transient,
            )
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_and_on_exhaustion() {
        let calls = AtomicU32::new(0);
        let c = &calls;
        let r: Result<()> = fast(5)
            .run(
                "t",
                move || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Config("bad".into()))
                },
                is_transient,
            )
            .await;
        assert!(r.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        let c = &calls;
        let r: Result<()> = fast(2)
            .run(
                "t",
                move || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Provider("down".into()))
                },
                is_transient,
            )
            .await;
        assert!(r.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
