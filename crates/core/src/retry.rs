use std::fmt::Display;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use tokio::time::sleep;

/// How a step retries calls to a backend that reports a transient failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of the (exponentially growing) delay.
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[inline]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts run
    /// out. The last error is returned in the latter two cases.
    pub(crate) async fn run<T, E, F, Fut, P>(
        &self,
        what: &str,
        is_transient: P,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= self.max_attempts || !is_transient(&err) {
                return Err(err);
            }
            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };
            warn!(
                "{what} failed (attempt {attempt}/{}): {err}, retrying in {delay:?}",
                self.max_attempts
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}
