//! Generic retry loop for fallible async operations.
//!
//! [`Executor`](crate::Executor) runs its attempts through [`run`]; the same
//! loop is usable for any other operation that needs a bounded retry budget.

use std::{future::Future, time::Duration};

use tokio::time::sleep;

/// Delay schedule between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// `failed_attempt * step`: 1x, 2x, 3x, ...
    Linear { step: Duration },
    /// `base * 2^(failed_attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after `failed_attempt` (1-based) before the next attempt.
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        match *self {
            Self::Linear { step } => step.saturating_mul(failed_attempt),
            Self::Exponential { base, max } => {
                let exp = failed_attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << exp).min(max)
            }
        }
    }
}

/// How many attempts to make and how long to wait between them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear {
                step: Duration::from_secs(1),
            },
        }
    }
}

/// Terminal outcome of [`run`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The last allowed attempt failed with a retryable error.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with an error the classifier refused to retry.
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    /// Unwraps the underlying error regardless of how the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } | Self::Aborted(last) => last,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempt budget is spent.
///
/// `operation` receives the 1-based attempt number. Only one attempt is in
/// flight at a time. Dropping the returned future cancels both the current
/// attempt and any pending backoff sleep.
pub async fn run<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut is_retryable: R,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(RetryError::Aborted(err)),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = policy.backoff.delay(attempt);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, backing off"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use tokio::time::Instant;

    use super::{run, Backoff, RetryError, RetryPolicy};

    #[test]
    fn linear_backoff_grows_by_step() {
        let backoff = Backoff::Linear {
            step: Duration::from_millis(1_000),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(1_000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2_000));
        assert_eq!(backoff.delay(3), Duration::from_millis(3_000));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures_with_linear_waits() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let policy = RetryPolicy::default();

        let value = run(
            &policy,
            |_: &&str| true,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("flaky")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await
        .expect("third attempt must succeed");

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s before attempt 2, 2s before attempt 3.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_keeps_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::Linear {
                step: Duration::from_millis(10),
            },
        };

        let err = run(
            &policy,
            |_: &String| true,
            |attempt| async move { Err::<(), _>(format!("failure {attempt}")) },
        )
        .await
        .expect_err("all attempts fail");

        match err {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "failure 2");
            }
            RetryError::Aborted(_) => panic!("expected exhaustion"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let err = run(
            &RetryPolicy::default(),
            |err: &&str| *err != "fatal",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("fatal") }
            },
        )
        .await
        .expect_err("fatal error must abort");

        assert!(matches!(err, RetryError::Aborted("fatal")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_budget_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let err = run(&policy, |_: &()| true, |_| async { Err::<(), _>(()) })
            .await
            .expect_err("must fail");
        assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
    }
}
