use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed pause between attempts. No backoff growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds, fails with an error `is_retryable` rejects,
    /// or the attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && is_retryable(&err) => {
                    log::warn!(
                        "attempt {attempt}/{} failed: {err}; retrying in {:?}",
                        self.max_attempts,
                        self.delay
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn stops_after_max_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = immediate(3)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Transient) }
                },
                |err| *err == TestError::Transient,
            )
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_first_success_without_further_attempts() {
        let calls = AtomicU32::new(0);
        let result = immediate(3)
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 2 {
                            Err(TestError::Transient)
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |err| *err == TestError::Transient,
            )
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_is_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = immediate(5)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Fatal) }
                },
                |err| *err == TestError::Transient,
            )
            .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn waits_the_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let started = std::time::Instant::now();
        let _: Result<(), TestError> = policy
            .run(|_| async { Err(TestError::Transient) }, |_| true)
            .await;

        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(immediate(0).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 3);
        assert_eq!(RetryPolicy::default().delay, Duration::from_secs(2));
    }
}
