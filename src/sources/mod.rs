//! Provider adapters
//!
//! Each adapter turns one package identifier into the provider requests it
//! needs, parses the responses, and hands back normalised [`StatFact`]s.
//! A provider's facts for one package are all-or-nothing: if any
//! constituent request fails, the adapter returns that error and records
//! nothing.

pub mod cdn;
pub mod npm;

use crate::errors::{FetchError, FetchResult};
use crate::types::{PackageId, Provider, StatFact};
use futures::future::BoxFuture;

pub use cdn::CdnSource;
pub use npm::NpmSource;

/// A statistics provider the per-package task queries
pub trait StatSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Fetch every fact this provider contributes for `package`
    fn collect<'a>(&'a self, package: &'a PackageId) -> BoxFuture<'a, FetchResult<Vec<StatFact>>>;
}

/// Add two counts, treating overflow as a malformed response
pub(crate) fn checked_sum(url: &str, a: u64, b: u64) -> FetchResult<u64> {
    a.checked_add(b).ok_or_else(|| FetchError::BadResponse {
        url: url.to_string(),
        reason: "download count overflows u64".to_string(),
    })
}

/// Decode a provider body into its typed shape
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    url: &str,
    body: serde_json::Value,
) -> FetchResult<T> {
    serde_json::from_value(body).map_err(|e| FetchError::BadResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
