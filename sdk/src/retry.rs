//! Retry with exponential backoff for collaborator HTTP calls.
//!
//! Only the transport layer retries (GraphQL queries, gateway fetches, block
//! lookups). Engine functions never retry on their own; a failure that survives
//! the transport retries propagates to the caller.

use crate::errors::MarketplaceError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_multiplier: f64,
    /// Random jitter as a fraction of the delay (0.0 - 1.0)
    pub jitter: f64,
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: 0.1,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryConfig {
    /// Settings for the public GraphQL gateway, which rate limits aggressively
    pub fn ledger() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: 0.25,
            retry_on: RetryOn::Transient,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            retry_on: RetryOn::Never,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (1-based; 0 yields no delay)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = (self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32 - 1))
        .min(self.max_delay.as_secs_f64());

        let delay = if self.jitter > 0.0 {
            let range = delay * self.jitter;
            (delay + rand::thread_rng().gen_range(-range..=range)).max(0.0)
        } else {
            delay
        };

        Duration::from_secs_f64(delay)
    }
}

/// When to retry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryOn {
    All,
    /// Only errors classified as transient
    Transient,
    Never,
}

/// Error classification for retry decisions
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for MarketplaceError {
    fn is_transient(&self) -> bool {
        match self {
            MarketplaceError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            other => other.is_retryable(),
        }
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or retries run out
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let should_retry = match config.retry_on {
                    RetryOn::All => true,
                    RetryOn::Transient => error.is_transient(),
                    RetryOn::Never => false,
                };

                if !should_retry || attempts > config.max_retries {
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempts);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempts,
                    config.max_retries + 1,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: 0.0,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 10.0,
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retries_transient_ledger_errors() {
        let attempts = AtomicU32::new(0);

        let result = retry(&fast(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(MarketplaceError::Ledger("gateway busy".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = retry(&fast(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::not_found("request", "x")) }
        })
        .await;

        assert!(matches!(result, Err(MarketplaceError::NotFound { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let attempts = AtomicU32::new(0);
        let config = fast().with_max_retries(2);

        let result: Result<(), _> = retry(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::Chain("rpc down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_never() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = retry(&RetryConfig::none(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketplaceError::Ledger("boom".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
