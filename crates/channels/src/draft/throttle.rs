use std::{future::Future, time::Duration};

use {
    helix_config::DraftStreamConfig,
    tokio::time::Instant,
    tokio_util::sync::CancellationToken,
    tracing::warn,
};

use crate::Result;

/// Minimum spacing between dispatches of one draft.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Throttle {
    interval: Duration,
    last_dispatch_at: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch_at: None,
        }
    }

    /// Time left before the next dispatch is allowed; zero when eligible.
    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        self.last_dispatch_at.map_or(Duration::ZERO, |last| {
            self.interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }

    pub(crate) fn mark(&mut self, now: Instant) {
        self.last_dispatch_at = Some(now);
    }
}

/// Bounded exponential backoff for send/edit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &DraftStreamConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            max_delay: Duration::from_millis(config.retry_max_ms),
        }
    }

    /// Delay before retry number `retry` (1-based). A platform supplied
    /// `retry_after` always wins.
    pub(crate) fn delay_for(&self, retry: u32, error: &crate::Error) -> Duration {
        if let Some(wait) = error.retry_after() {
            return wait;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `request` until it succeeds, fails permanently, exhausts the retry
    /// budget, or `cancel` fires.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &'static str,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;

        loop {
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() || cancel.is_cancelled() {
                return Err(err);
            }
            if retries >= self.max_retries {
                warn!(
                    operation,
                    retries,
                    max_retries = self.max_retries,
                    error = %err,
                    "draft dispatch still failing after retries"
                );
                return Err(err);
            }

            retries += 1;
            let wait = self.delay_for(retries, &err);
            warn!(
                operation,
                retries,
                max_retries = self.max_retries,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "draft dispatch failed, waiting before retry"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(err),
                () = tokio::time::sleep(wait) => {},
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::Error,
        std::sync::atomic::{AtomicU32, Ordering},
    };

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        }
    }

    #[test]
    fn throttle_remaining() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(200));
        assert_eq!(throttle.remaining(start), Duration::ZERO);

        throttle.mark(start);
        assert_eq!(throttle.remaining(start), Duration::from_millis(200));
        assert_eq!(
            throttle.remaining(start + Duration::from_millis(150)),
            Duration::from_millis(50)
        );
        assert_eq!(
            throttle.remaining(start + Duration::from_millis(900)),
            Duration::ZERO
        );
    }

    #[test]
    fn delay_doubles_and_caps() {
        let p = policy(5);
        let err = Error::unavailable("down");
        assert_eq!(p.delay_for(1, &err), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, &err), Duration::from_millis(200));
        assert_eq!(p.delay_for(3, &err), Duration::from_millis(350));
        assert_eq!(p.delay_for(30, &err), Duration::from_millis(350));
    }

    #[test]
    fn delay_honours_retry_after() {
        let err = Error::rate_limited(Duration::from_secs(9));
        assert_eq!(policy(3).delay_for(1, &err), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn run_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = policy(3)
            .run(&cancel, "edit", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::unavailable("flaky"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<()> = policy(2)
            .run(&cancel, "edit", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::unavailable("down")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<()> = policy(5)
            .run(&cancel, "send", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::rejected("chat not found")) }
            })
            .await;
        assert!(matches!(result, Err(Error::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_retrying_once_cancelled() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = policy(5)
            .run(&cancel, "edit", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::unavailable("down")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
