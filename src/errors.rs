use thiserror::Error;

/// Application-wide error type - single point of truth
///
/// Everything here is a setup or persistence failure: it aborts the run.
/// Per-request and per-package failures use [`FetchError`] and
/// [`TaskError`] and never escape their own layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration issues
    #[error("Configuration error: {0}")]
    Config(String),

    /// Package catalog missing or malformed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Previously persisted totals unreadable or malformed
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// File I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding outside the fetch path
    #[error("JSON error: {0}")]
    Json(String),

    /// Output artifacts could not be committed
    #[error("Persist error: {path}: {reason}")]
    Persist { path: String, reason: String },
}

/// Outbound request failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, DNS failure, connection reset or timeout
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Any non-success status other than 429
    #[error("HTTP {status} from {url}")]
    BadStatus { url: String, status: u16 },

    /// Body was not valid JSON or did not carry a usable count
    #[error("Invalid response from {url}: {reason}")]
    BadResponse { url: String, reason: String },

    /// Only produced when a retry cap is configured
    #[error("Rate limited {attempts} times, giving up on {url}")]
    RateLimited { url: String, attempts: u32 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::BadStatus { url, .. }
            | FetchError::BadResponse { url, .. }
            | FetchError::RateLimited { url, .. } => url,
        }
    }
}

/// Failure of a single package task, isolated by the worker pool
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{package}: all {attempted} sources failed")]
    SourcesFailed { package: String, attempted: usize },

    #[error("{package}: task panicked: {message}")]
    Panicked { package: String, message: String },
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
