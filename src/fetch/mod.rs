//! Outbound HTTP for the statistics providers
//!
//! This module provides:
//! - **Transport** - `HttpTransport` trait seam and the reqwest-backed implementation
//! - **Client** - `RateLimitedFetcher`, a single GET with timeout and fixed-delay 429 retry
//! - **Retry** - rate-limit policy and timeout wrapper
//!
//! Every failure is logged here and returned as a `FetchError`; nothing
//! above this layer sees a panic or a raw transport error.

pub mod client;
pub mod retry;
pub mod transport;

// Re-export main types
pub use client::{FetchCounts, FetchStats, RateLimitedFetcher};
pub use retry::{execute_with_timeout, RateLimitPolicy};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
