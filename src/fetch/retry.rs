//! Retry utilities for provider requests
//!
//! Rate limiting uses a fixed backoff between attempts, with an optional
//! cap that only tests set.

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio::time::timeout;

/// How a fetch reacts to HTTP 429
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Wait between attempts
    pub backoff: Duration,
    /// `None` retries until the provider stops throttling
    pub max_retries: Option<u32>,
}

impl RateLimitPolicy {
    pub fn new(backoff: Duration, max_retries: Option<u32>) -> Self {
        Self {
            backoff,
            max_retries,
        }
    }

    /// Whether another attempt is allowed when `retries` retries were already made
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use download_badges::fetch::RateLimitPolicy;
    ///
    /// let capped = RateLimitPolicy::new(Duration::from_millis(1), Some(2));
    /// assert!(capped.should_retry(0));
    /// assert!(capped.should_retry(1));
    /// assert!(!capped.should_retry(2));
    ///
    /// let unbounded = RateLimitPolicy::new(Duration::from_millis(1), None);
    /// assert!(unbounded.should_retry(10_000));
    /// ```
    pub fn should_retry(&self, retries: u32) -> bool {
        match self.max_retries {
            Some(cap) => retries < cap,
            None => true,
        }
    }
}

/// Execute an operation with a timeout wrapper
///
/// The outer `Err` means the timeout elapsed; the inner value is whatever
/// the operation produced.
pub async fn execute_with_timeout<T, F>(duration: Duration, operation: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    timeout(duration, operation).await
}
