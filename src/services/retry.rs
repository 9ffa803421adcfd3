use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RetryConfig;

/// Retry policy for calls to external collaborators.
///
/// Transient failures (see [`DomainError::is_transient`]) are retried with
/// exponential backoff; everything else is returned on first occurrence.
/// Every attempt is bounded by the per-call timeout.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
    /// Upper bound for a single attempt
    call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &RetryConfig, service_timeout_ms: u64) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
        .with_timeout(Duration::from_millis(service_timeout_ms))
    }

    #[must_use]
    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `operation` against `service`, retrying transient failures.
    ///
    /// A timed-out attempt surfaces as [`DomainError::Timeout`], which is
    /// itself transient.
    pub async fn execute<F, Fut, T>(&self, service: &str, mut operation: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match self.attempt(service, operation()).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(service, retries = attempt, "call succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            service,
                            attempt = attempt + 1,
                            error = %err,
                            backoff_ms = backoff.as_millis() as u64,
                            "transient failure, retrying"
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt >= self.max_retries && err.is_transient() {
                            warn!(service, attempts = attempt + 1, error = %err, "retries exhausted");
                        } else {
                            debug!(service, error = %err, "permanent failure, not retrying");
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn attempt<Fut, T>(&self, service: &str, fut: Fut) -> DomainResult<T>
    where
        Fut: Future<Output = DomainResult<T>>,
    {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout {
                service: service.to_string(),
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }

    /// `min(initial_backoff * 2^attempt, max_backoff)`
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &DomainError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), 30_000)
    }
}
