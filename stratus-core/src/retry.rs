//! Retry - rerun a control-plane call while it fails transiently
//!
//! Mutating calls against an eventually consistent API can fail for reasons
//! that clear on their own, like a referenced resource that is not visible
//! yet or a dependent that is still draining. Callers wrap one attempt in a
//! closure and classify each failure as transient or permanent; the helper
//! keeps attempting until success, a permanent failure, or the wall-clock
//! budget runs out.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::provider::BoxFuture;

/// Pacing between attempts when the caller does not choose one
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// A failed attempt, classified by the caller
#[derive(Debug)]
pub struct AttemptError<E> {
    err: E,
    retryable: bool,
}

impl<E> AttemptError<E> {
    /// The failure is expected to clear on its own; keep attempting
    pub fn transient(err: E) -> Self {
        Self {
            err,
            retryable: true,
        }
    }

    /// The failure is final; stop immediately
    pub fn permanent(err: E) -> Self {
        Self {
            err,
            retryable: false,
        }
    }
}

/// Terminal failure of [`retry`]
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error> {
    /// Attempts kept failing transiently until the budget ran out
    #[error("still failing after {elapsed:?}: {last}")]
    Timeout { last: E, elapsed: Duration },

    /// An attempt failed in a way classified as permanent
    #[error(transparent)]
    Permanent(E),
}

impl<E: std::error::Error> RetryError<E> {
    /// True when the operation ran out of time rather than hitting a
    /// permanent failure. Callers commonly respond with one final
    /// out-of-band attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The error from the last attempt
    pub fn into_inner(self) -> E {
        match self {
            Self::Timeout { last, .. } => last,
            Self::Permanent(err) => err,
        }
    }
}

/// Keep invoking `op` until it succeeds, fails permanently, or `timeout`
/// elapses, pacing attempts by [`DEFAULT_RETRY_INTERVAL`]
pub async fn retry<'a, T, E, F>(timeout: Duration, op: F) -> Result<T, RetryError<E>>
where
    E: std::error::Error,
    F: FnMut() -> BoxFuture<'a, Result<T, AttemptError<E>>>,
{
    retry_every(timeout, DEFAULT_RETRY_INTERVAL, op).await
}

/// Like [`retry`], with an explicit pause between attempts
pub async fn retry_every<'a, T, E, F>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error,
    F: FnMut() -> BoxFuture<'a, Result<T, AttemptError<E>>>,
{
    let started = Instant::now();
    loop {
        let last = match op().await {
            Ok(value) => return Ok(value),
            Err(attempt) if attempt.retryable => attempt.err,
            Err(attempt) => return Err(RetryError::Permanent(attempt.err)),
        };

        let elapsed = started.elapsed();
        let remaining = timeout.saturating_sub(elapsed);
        if remaining.is_zero() {
            return Err(RetryError::Timeout { last, elapsed });
        }
        sleep(interval.min(remaining)).await;
        if started.elapsed() >= timeout {
            return Err(RetryError::Timeout {
                last,
                elapsed: started.elapsed(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct OpError(&'static str);

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = calls.clone();
        let value = retry(Duration::from_secs(1), move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AttemptError<OpError>>("igw-1")
            })
        })
        .await
        .unwrap();

        assert_eq!(value, "igw-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_again_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let value = retry_every(Duration::from_secs(1), Duration::from_millis(10), move || {
            let counter = counter.clone();
            Box::pin(async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AttemptError::transient(OpError("not visible yet")))
                } else {
                    Ok("igw-1")
                }
            })
        })
        .await
        .unwrap();

        assert_eq!(value, "igw-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let err = retry_every(
            Duration::from_secs(1),
            Duration::from_millis(10),
            move || {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AttemptError::permanent(OpError("access denied")))
                })
            },
        )
        .await
        .unwrap_err();

        assert!(!err.is_timeout());
        assert_eq!(err.into_inner().0, "access denied");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_timeout_with_last_error() {
        let started = Instant::now();

        let err = retry_every(
            Duration::from_millis(50),
            Duration::from_millis(10),
            move || {
                Box::pin(async move {
                    Err::<(), _>(AttemptError::transient(OpError("dependency violation")))
                })
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("dependency violation"));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(err.into_inner().0, "dependency violation");
    }
}
