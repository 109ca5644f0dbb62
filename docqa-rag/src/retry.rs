//! Timeout and retry policy for calls to external APIs.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RagError, Result};

/// Longest delay ever slept between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded-timeout, limited-retry policy applied to every embedding and
/// completion call.
///
/// Each attempt runs under `timeout`. A failed attempt is retried only when
/// the error is transient ([`RagError::is_transient`]) and fewer than
/// `max_retries` retries have happened; the n-th retry waits
/// `backoff * 2^(n-1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Time budget for a single attempt.
    pub timeout: Duration,
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries but still enforces `timeout`.
    pub fn no_retry(timeout: Duration) -> Self {
        Self { timeout, max_retries: 0, backoff: Duration::ZERO }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(5);
        self.backoff.saturating_mul(1u32 << exponent).min(MAX_BACKOFF)
    }

    /// Run `call` under this policy.
    ///
    /// `operation` names the call in logs and in [`RagError::Timeout`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RagError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn transient() -> RagError {
        RagError::EmbeddingError {
            provider: "test".into(),
            message: "503".into(),
            retryable: true,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { backoff: Duration::from_millis(100), ..Default::default() };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert!(policy.backoff_for(40) <= MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failure_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result = policy
            .run("embedding", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 { Err(transient()) } else { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .run("embedding", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .run("completion", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RagError::ConfigError("bad key".into()))
            })
            .await;

        assert!(matches!(result, Err(RagError::ConfigError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let policy = RetryPolicy::no_retry(Duration::from_millis(50));

        let result: Result<()> = policy
            .run("completion", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(RagError::Timeout { operation, timeout_ms }) => {
                assert_eq!(operation, "completion");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
