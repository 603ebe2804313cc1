use crate::constants::retry;
use crate::error::{Result, TaleError};
use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry for transient model failures.
///
/// `max_attempts` counts every call, the first one included. Only errors for
/// which [`TaleError::is_transient`] holds are retried; once the attempts are
/// used up the last error is escalated to [`TaleError::FatalService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            delay: Duration::from_secs(retry::DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `on_retry` is told the number of the failed attempt and its error
    /// before each wait.
    pub async fn run<T, F, Fut, R>(&self, label: &str, mut op: F, mut on_retry: R) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32, &TaleError),
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= self.max_attempts {
                        tracing::error!(label, attempt, error = %err, "retries exhausted");
                        return Err(TaleError::FatalService {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    tracing::warn!(
                        label,
                        attempt,
                        delay_secs = self.delay.as_secs_f32(),
                        error = %err,
                        "transient failure, retrying"
                    );
                    on_retry(attempt, &err);
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_with_fixed_spacing() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);
        let retries = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run(
                "test",
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TaleError::TransientService("429".into())) }
                },
                |_, _| retries.set(retries.get() + 1),
            )
            .await;

        assert!(matches!(result, Err(TaleError::FatalService { attempts: 5, .. })));
        assert_eq!(calls.get(), 5);
        assert_eq!(retries.get(), 4);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4 * retry::DELAY_SECS));
        assert!(elapsed < Duration::from_secs(5 * retry::DELAY_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let calls = Cell::new(0u32);

        let result = policy
            .run(
                "test",
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 3 {
                            Err(TaleError::TransientService("busy".into()))
                        } else {
                            Ok(n)
                        }
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0u32);

        let result: Result<()> = policy
            .run(
                "test",
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TaleError::Llm("bad request".into())) }
                },
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(TaleError::Llm(_))));
        assert_eq!(calls.get(), 1);
    }
}
