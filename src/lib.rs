//! npm and jsDelivr download statistics aggregator
//!
//! Fetches per-package counts with a bounded worker pool, sums them into
//! monthly and cumulative totals, and rewrites shields.io badge and
//! ranking documents when the cumulative total has grown.

pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod persist;
pub mod pipeline;
pub mod pool;
pub mod sources;
pub mod types;
pub mod utils;
