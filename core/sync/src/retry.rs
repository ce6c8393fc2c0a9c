//! Exponential backoff for transient transport failures.
//!
//! Only errors reporting `is_transient()` are retried. Authentication
//! failures and conflict outcomes propagate immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[cfg(test)]
use genpwd_common::Error;
use genpwd_common::Result;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Cap for exponential growth.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add +/- 25% random jitter to delays.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the given retry attempt (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            capped * (0.75 + rand::random::<f64>() * 0.5)
        } else {
            capped
        };

        Duration::from_millis(final_delay as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs operations, retrying transient failures with backoff.
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation`, retrying while it fails transiently.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retrying");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_transient() {
                        return Err(err);
                    }

                    attempt += 1;
                    if attempt > self.config.max_retries {
                        warn!(
                            attempts = attempt,
                            error = %err,
                            "Giving up after exhausting retries"
                        );
                        return Err(err);
                    }

                    let delay = self.config.delay_for_attempt(attempt - 1);
                    warn!(attempt, error = %err, ?delay, "Transient failure, retrying");
                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Retry with default configuration.
pub async fn retry<F, Fut, T>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryExecutor::default().execute(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_grows_exponentially() {
        let config = RetryConfig::new(3)
            .with_initial_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_cap() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result: Result<i32> = RetryExecutor::default().execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let config = RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);

        let result: Result<i32> = RetryExecutor::new(config)
            .execute(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::TransientNetwork("connection reset".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_authentication_error_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32> = RetryExecutor::default()
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Authentication)
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Authentication)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let config = RetryConfig::new(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);

        let result: Result<i32> = RetryExecutor::new(config)
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::TransientNetwork("still down".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
