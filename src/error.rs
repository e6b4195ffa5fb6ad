//! Error kinds for the export pipeline
//!
//! Each kind carries its own failure policy:
//! - [`FetchError`]: job-fatal, never retried at the fetch layer
//! - [`CacheBuildError`]: non-fatal, the reference cache degrades to empty
//! - [`DeliveryError`]: retried by the delivery client, then counted as failed
//! - [`ConfigError`]: fatal before any job starts

use thiserror::Error;

/// Failure while fetching a page from the query API
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the connection failed
    #[error("query API request failed: {0}")]
    Transport(String),

    /// The query API answered with a non-success status
    #[error("query API returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The response body could not be decoded into records
    #[error("invalid query API response: {0}")]
    Decode(String),

    /// A GraphQL response carried an `errors` array
    #[error("query returned errors: {0}")]
    Query(String),

    /// The request could not be built (bad URL, bad query definition)
    #[error("invalid query request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::Request(err.to_string())
    }
}

/// A reference table could not be loaded
#[derive(Error, Debug)]
#[error("reference table '{table}' unavailable: {source}")]
pub struct CacheBuildError {
    /// Name of the reference table
    pub table: String,
    /// Underlying fetch failure
    #[source]
    pub source: FetchError,
}

/// A batch could not be delivered to the ingestion endpoint
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Every attempt allowed by the retry policy failed
    #[error("batch of {events} event(s) abandoned after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Number of events in the abandoned batch
        events: usize,
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },
}

/// Startup configuration problem
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set or empty
    #[error("{0} is not set")]
    Missing(String),

    /// A credential still holds its placeholder value
    #[error("{0} still holds a placeholder value, set a real credential")]
    Placeholder(String),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: String,
        /// Why the value was rejected
        reason: String,
    },
}
