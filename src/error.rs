//! Error types for listing-report
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Fetch, Config, Report I/O)
//! - A strict boundary between run-level errors and page-level failures:
//!   a single failed page is DATA ([`crate::types::PageError`]), never an
//!   [`Error`], and never aborts a run

use crate::types::PageId;
use thiserror::Error;

/// Result type alias for listing-report operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for listing-report
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Fetch error escalated to run level (e.g., page count discovery failed)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV report writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run cancelled by an operator interrupt before completion
    #[error("interrupted")]
    Interrupted,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Page-fetching errors
///
/// Raised by [`crate::fetcher::PageFetcher`] implementations. The pagination
/// engine converts per-page occurrences into [`crate::types::PageError`]
/// entries; only page-count discovery failures propagate as [`Error::Fetch`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success HTTP status
    #[error("page {page}: HTTP status {status}")]
    Status {
        /// The page index that was requested
        page: PageId,
        /// The HTTP status code returned by the server
        status: u16,
    },

    /// Request failed before a response was received (connect, timeout, ...)
    #[error("page {page}: request failed: {source}")]
    Request {
        /// The page index that was requested
        page: PageId,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Response body could not be interpreted as the expected shape
    #[error("page {page}: malformed response body: {reason}")]
    MalformedBody {
        /// The page index that was requested
        page: PageId,
        /// Why the body was rejected
        reason: String,
    },

    /// A configured JSON pointer did not resolve in the response body
    #[error("page {page}: missing field at {pointer:?}")]
    MissingField {
        /// The page index that was requested
        page: PageId,
        /// The JSON pointer that failed to resolve
        pointer: String,
    },

    /// Total page count could not be determined before scheduling
    #[error("could not determine total page count: {reason}")]
    TotalPagesUnavailable {
        /// Why discovery failed
        reason: String,
    },

    /// Engine configuration produced an invalid request URL
    #[error("invalid engine URL {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}
