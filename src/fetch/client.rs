use crate::config::FetchConfig;
use crate::errors::{FetchError, FetchResult};
use crate::fetch::{execute_with_timeout, HttpTransport, RateLimitPolicy};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Counters shared by every clone of a fetcher
#[derive(Debug, Default)]
pub struct FetchStats {
    requests: AtomicU64,
    rate_limited: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub requests: u64,
    pub rate_limited: u64,
    pub failures: u64,
}

impl FetchStats {
    pub fn counts(&self) -> FetchCounts {
        FetchCounts {
            requests: self.requests(),
            rate_limited: self.rate_limited(),
            failures: self.failures(),
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn rate_limited(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// One GET per call, retried on 429, every failure logged
#[derive(Clone)]
pub struct RateLimitedFetcher {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
    policy: RateLimitPolicy,
    stats: Arc<FetchStats>,
}

impl RateLimitedFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &FetchConfig) -> Self {
        Self::with_policy(
            transport,
            config.timeout(),
            RateLimitPolicy::new(config.rate_limit_backoff(), config.max_rate_limit_retries),
        )
    }

    pub fn with_policy(
        transport: Arc<dyn HttpTransport>,
        timeout: Duration,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            transport,
            timeout,
            policy,
            stats: Arc::new(FetchStats::default()),
        }
    }

    /// Counters shared with every clone of this fetcher
    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// GET `url` and parse the body as JSON
    pub async fn fetch(&self, url: &str) -> FetchResult<Value> {
        let mut retries = 0u32;

        loop {
            self.stats.requests.fetch_add(1, Ordering::Relaxed);

            let response = match execute_with_timeout(self.timeout, self.transport.get(url)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(message)) => {
                    return Err(self.fail(FetchError::Transport {
                        url: url.to_string(),
                        message,
                    }));
                }
                Err(_) => {
                    return Err(self.fail(FetchError::Transport {
                        url: url.to_string(),
                        message: format!("timed out after {}ms", self.timeout.as_millis()),
                    }));
                }
            };

            if response.status == HTTP_TOO_MANY_REQUESTS {
                self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);

                if !self.policy.should_retry(retries) {
                    return Err(self.fail(FetchError::RateLimited {
                        url: url.to_string(),
                        attempts: retries + 1,
                    }));
                }
                retries += 1;

                warn!(
                    "Rate limited ({}x) on {}, retrying in {}ms",
                    retries,
                    url,
                    self.policy.backoff.as_millis()
                );
                sleep(self.policy.backoff).await;
                continue;
            }

            if !response.is_success() {
                return Err(self.fail(FetchError::BadStatus {
                    url: url.to_string(),
                    status: response.status,
                }));
            }

            if retries > 0 {
                debug!("Fetched {} after {} rate-limited attempts", url, retries);
            }

            return serde_json::from_str(&response.body).map_err(|e| {
                self.fail(FetchError::BadResponse {
                    url: url.to_string(),
                    reason: format!("body is not JSON: {}", e),
                })
            });
        }
    }

    fn fail(&self, error: FetchError) -> FetchError {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        warn!("Fetch failed: {}", error);
        error
    }
}
