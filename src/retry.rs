//! Bounded retry with capped exponential backoff.
//!
//! The delay before retry `n` (0-based) is `min(base * 2^n, max) + rand() * jitter`,
//! which with the defaults is the familiar `min(2^n, 8) + rand()` seconds.

use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, SearchError};

/// Statuses worth another attempt: timeouts, rate limiting and upstream/CDN errors.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        408 | 425 | 429 | 500 | 502 | 503 | 504 | 520..=524
    )
}

/// Predicate deciding whether a failed attempt may be repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Status { status, .. } => is_retryable_status(*status),
            FetchError::Tls(_)
            | FetchError::Challenge(_)
            | FetchError::NotHtml(_)
            | FetchError::InvalidUrl(_)
            | FetchError::Client(_) => false,
        }
    }
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::Request(err) => err.is_timeout() || err.is_connect(),
            SearchError::Status(status) => is_retryable_status(*status),
            SearchError::Payload(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniformly random delay added to every backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Policy with no waiting between attempts, handy where latency matters more than politeness.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let exponential = self.base_delay.saturating_mul(factor).min(self.max_delay);
        exponential + self.jitter.mul_f64(rand::random::<f64>())
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(attempt, ?delay, error = %err, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status_error(status: u16) -> FetchError {
        FetchError::Status {
            status,
            kind: FailureKind::from_status(status),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 425, 429, 500, 502, 503, 504, 520, 521, 522, 523, 524] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [200, 401, 402, 403, 404, 406, 451, 501, 525] {
            assert!(!is_retryable_status(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        for attempt in 0..20 {
            let delay = policy.backoff(attempt);
            assert!(delay <= Duration::from_secs(9), "attempt {attempt}: {delay:?}");
        }
        assert!(policy.backoff(0) >= Duration::from_secs(1));
        assert!(policy.backoff(3) >= Duration::from_secs(8));
    }

    #[test]
    fn test_immediate_policy_has_no_delay() {
        assert_eq!(RetryPolicy::immediate(3).backoff(5), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_stops_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = RetryPolicy::immediate(2)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status_error(503)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_permanent_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = RetryPolicy::immediate(2)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status_error(403)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_recovers_after_transient_failure() {
        let result = RetryPolicy::immediate(2)
            .run(|attempt| async move {
                if attempt == 0 {
                    Err(FetchError::Timeout)
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }
}
