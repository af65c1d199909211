//! Error types for upstream API access.
//!
//! The retry layer cares about exactly three classes of failure: transient
//! (rate limit or network, retried), definitive-absent (404 or a payload
//! with no identifier, cached as a negative result), and fatal (anything
//! else, propagated immediately).

use std::time::Duration;

use thiserror::Error;

/// Result type for MET API operations.
pub type MetResult<T> = Result<T, MetError>;

/// Errors from the MET collection API client.
#[derive(Debug, Error)]
pub enum MetError {
    /// Non-404 HTTP error status. 429 and 403 are transient, the rest fatal.
    #[error("HTTP {status} from {url}")]
    Http {
        status: u16,
        url: String,
        /// Parsed Retry-After header, when the server sent one.
        retry_after: Option<Duration>,
    },
    /// Definitive-absent: the upstream catalog has no such record.
    #[error("Not found: {url}")]
    NotFound { url: String },
    /// Response was not application/json.
    #[error("Unexpected content type {content_type:?} from {url}")]
    InvalidContentType {
        content_type: Option<String>,
        url: String,
    },
    /// Network-level failure (connect, DNS, timeout). Always transient.
    #[error("Request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Body claimed to be JSON but did not parse or had the wrong shape.
    #[error("Invalid JSON from {url}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// A transient failure persisted through every retry attempt.
    #[error("Retries exhausted after {attempts} attempts for {url}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<MetError>,
    },
    /// Persistence layer failure during import.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl MetError {
    /// Whether this failure is worth retrying (or, for an exhausted retry,
    /// worth an extended pause during batch processing).
    pub fn is_transient(&self) -> bool {
        match self {
            MetError::Http { status, .. } => matches!(status, 429 | 403),
            MetError::Network { .. } => true,
            MetError::RetriesExhausted { .. } => true,
            _ => false,
        }
    }

    /// Whether this is the definitive-absent outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetError::NotFound { .. })
    }

    /// Last known HTTP status, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            MetError::Http { status, .. } => Some(*status),
            MetError::NotFound { .. } => Some(404),
            MetError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Server-requested retry delay, if one was attached to the response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MetError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
