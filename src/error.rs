//! Error types for corpus-dl
//!
//! This module provides error handling for the library:
//! - Domain-specific variants (fetch, enumeration, config, storage)
//! - Context information (URL, target key, HTTP status, file path)
//!
//! HTTP 404 is deliberately NOT an error anywhere in this crate; it is a
//! distinguished non-error outcome modeled by [`crate::fetch::FetchPayload`].

use thiserror::Error;

use crate::types::TargetKey;

/// Result type alias for corpus-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for corpus-dl
///
/// Each variant includes enough context to diagnose the failure without
/// re-running the crawl (URL, key, status code, path).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue_capacity")
        key: Option<String>,
    },

    /// Fetch returned an HTTP status that is neither success nor 404
    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus {
        /// The URL that was fetched
        url: String,
        /// The HTTP status code received
        status: u16,
    },

    /// Transport-level fetch failure (timeout, connection reset, DNS)
    #[error("network error for {url}: {source}")]
    Network {
        /// The URL that was being fetched
        url: String,
        /// The underlying transport error
        source: reqwest::Error,
    },

    /// A fetch target failed terminally under the fail-fast policy
    #[error("fetch failed for target {key} ({url})")]
    Target {
        /// Stable key of the failing target
        key: TargetKey,
        /// URL of the failing target
        url: String,
        /// The underlying fetch error
        #[source]
        source: Box<Error>,
    },

    /// A listing page could not be interpreted during enumeration
    #[error("malformed listing page {page}: {message}")]
    MalformedListing {
        /// URL or file path of the listing page
        page: String,
        /// What was wrong with it
        message: String,
    },

    /// A configured CSS selector failed to parse
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector string from the configuration
        selector: String,
        /// Parse error description
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
