//! One reusable exponential-backoff-with-full-jitter policy, shared by the
//! Source Reader's throttle handling and the Sink Writer's upload retries
//! (`spec.md` §9: "Retry/backoff duplication ... factor into one reusable
//! policy value, not three code paths").

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{SinkError, SourceError};

/// Exponential backoff with full jitter, capped at
/// `base_delay × 2^max_retries` (per `spec.md` §4.1).
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The cap for the given attempt: `base × 2^min(attempt, max_retries)`,
    /// never exceeding `base × 2^max_retries`.
    fn cap_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.max_retries).min(32);
        let shift_cap = self.max_retries.min(32);
        let attempt_ms = self.base_delay.as_millis().saturating_mul(1u128 << exp);
        let overall_cap_ms = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << shift_cap);
        Duration::from_millis(attempt_ms.min(overall_cap_ms).min(u64::MAX as u128) as u64)
    }

    /// A uniform random delay in `[0, cap_for_attempt(attempt)]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let cap = self.cap_for_attempt(attempt);
        if cap.is_zero() {
            return cap;
        }
        let millis = rand::thread_rng().gen_range(0..=cap.as_millis() as u64);
        Duration::from_millis(millis)
    }

    pub async fn sleep_for_attempt(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for_attempt(attempt)).await;
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 3)
    }
}

/// Errors that can declare whether they are worth retrying. Implemented for
/// [`SourceError`] and [`SinkError`] so [`run_with_retry`] works for both
/// the Reader and the Writer without duplicating the loop.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        SourceError::is_retryable(self)
    }
}

impl Retryable for SinkError {
    fn is_retryable(&self) -> bool {
        SinkError::is_retryable(self)
    }
}

/// Runs `op` up to `policy.max_retries() + 1` times total (the first
/// attempt is attempt 0, per `spec.md` §4.4), sleeping on the shared
/// backoff policy between retryable failures. Returns the first success or
/// the last (non-retryable, or retry-exhausted) error.
pub async fn run_with_retry<T, E, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries() => {
                policy.sleep_for_attempt(attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_never_exceeds_overall_cap() {
        let policy = BackoffPolicy::new(Duration::from_millis(1000), 3);
        let overall_cap_ms = 1000 * 2u64.pow(3);
        for attempt in 0..10 {
            for _ in 0..50 {
                let delay = policy.delay_for_attempt(attempt);
                assert!(delay.as_millis() as u64 <= overall_cap_ms);
            }
        }
    }

    #[test]
    fn delay_for_attempt_zero_is_bounded_by_base_delay() {
        let policy = BackoffPolicy::new(Duration::from_millis(1000), 3);
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay.as_millis() <= 1000);
        }
    }

    #[tokio::test]
    async fn run_with_retry_succeeds_after_transient_failures() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), 3);
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&policy, |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SourceError::Throttled)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_with_retry_stops_after_max_retries() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), 2);
        let calls = AtomicU32::new(0);
        let result: Result<(), SourceError> = run_with_retry(&policy, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(SourceError::Throttled) }
        })
        .await;
        assert!(result.is_err());
        // attempt 0 (initial) + 2 retries = 3 calls total
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_with_retry_does_not_retry_fatal_errors() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), 3);
        let calls = AtomicU32::new(0);
        let result: Result<(), SourceError> = run_with_retry(&policy, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(SourceError::Fatal {
                    segment: 0,
                    reason: "boom".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
