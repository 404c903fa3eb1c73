use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Raised once a retry budget is exhausted.
#[derive(Debug)]
pub struct MaxRetriesExceeded<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for MaxRetriesExceeded<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retries exhausted after {} attempts: {}", self.attempts, self.last)
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// The predicate rejected this error outright; no retry was attempted.
    NonRetriable(E),
    MaxRetriesExceeded(MaxRetriesExceeded<E>),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::NonRetriable(e) => write!(f, "{e}"),
            RetryError::MaxRetriesExceeded(e) => write!(f, "{e}"),
        }
    }
}

/// Run `op` with exponential backoff: delay = min(base * 2^attempt, cap).
///
/// `retriable` decides whether a given error should be retried at all; a
/// `false` verdict propagates the error immediately without sleeping.
pub async fn retry<T, E, F, Fut, R>(mut op: F, max_retries: u32, base: Duration, cap: Duration, retriable: R) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if !retriable(&err) {
                    return Err(RetryError::NonRetriable(err));
                }
                if attempt >= max_retries {
                    return Err(RetryError::MaxRetriesExceeded(MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last: err,
                    }));
                }
                let delay = base.checked_mul(1u32 << attempt).unwrap_or(cap).min(cap);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn succeeds_after_k_failures_within_budget() {
        let calls = AtomicU32::new(0);
        let result = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
            2,
            Duration::from_millis(1),
            Duration::from_millis(100),
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries_and_reports_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("always fails") }
            },
            2,
            Duration::from_millis(1),
            Duration::from_millis(100),
            |_| true,
        )
        .await;
        match result {
            Err(RetryError::MaxRetriesExceeded(e)) => assert_eq!(e.attempts, 3),
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retriable_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<i32, _> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("fatal") }
            },
            5,
            Duration::from_millis(50),
            Duration::from_millis(500),
            |_| false,
        )
        .await;
        assert!(matches!(result, Err(RetryError::NonRetriable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn delay_is_capped() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let _: Result<i32, _> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("x") }
            },
            3,
            Duration::from_millis(20),
            Duration::from_millis(25),
            |_| true,
        )
        .await;
        // delays would be 20, 40(capped to 25), 80(capped to 25) = 70ms total uncapped would be 140ms
        assert!(start.elapsed() < Duration::from_millis(120));
    }
}
