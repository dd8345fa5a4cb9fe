use std::time::Duration;

use thiserror::Error;

/// Transport-level failure reported by a [`Fetcher`](crate::version::fetcher::Fetcher)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Timed out fetching {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
}

/// Failure of a single handler's contribution to a scan
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unexpected listing format: {0}")]
    Extraction(String),

    #[error("Handler misconfigured: {0}")]
    Configuration(String),

    #[error("Handler {handler} does not support {entry_point}")]
    Unsupported {
        handler: &'static str,
        entry_point: &'static str,
    },

    #[error("Handler did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("Scan cancelled before handler finished")]
    Cancelled,
}

/// Malformed scan options
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("Invalid mangling rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Rule '{rule}' is not allowed in {kind}")]
    MisplacedRule { rule: String, kind: &'static str },
}

/// Error that aborts a single package scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    #[error("Handler {handler} misconfigured: {message}")]
    HandlerConfiguration { handler: String, message: String },
}
