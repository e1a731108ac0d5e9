//! Exponential backoff for ERP calls

use crate::error::{PortalError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry settings: `max_retries` extra attempts, waiting `base_delay * 2^n`
/// before retry `n` (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the random offset added when rate limited
    pub rate_limit_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; for tests against a local mock server.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            rate_limit_jitter: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.rate_limit_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails with an error `should_retry` rejects,
    /// or retries run out. Exhaustion is reported as
    /// [`PortalError::RetriesExhausted`] wrapping the last failure.
    pub async fn run<T, F, Fut>(
        &self,
        endpoint: &str,
        should_retry: impl Fn(&PortalError) -> bool,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !should_retry(&err) {
                return Err(err);
            }
            if retry >= self.max_retries {
                log::error!("{} failed after {} attempts: {}", endpoint, retry + 1, err);
                return Err(PortalError::RetriesExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: retry + 1,
                    source: Box::new(err),
                });
            }

            retry += 1;
            let mut delay = self.delay_for(retry);
            if err.is_rate_limited() {
                delay += self.jitter();
            }
            log::warn!(
                "{} failed ({}), retry {}/{} in {:?}",
                endpoint,
                err,
                retry,
                self.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
