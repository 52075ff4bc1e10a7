//! Error types for the purge tool.

use thiserror::Error;

use crate::domain::IndicatorId;

/// Result type alias using the ti-purge error type.
pub type Result<T> = std::result::Result<T, PurgeError>;

/// Main error type for listing, deleting and coordinating purges.
#[derive(Error, Debug)]
pub enum PurgeError {
    /// Validation error (e.g., out of range confidence, empty source list)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport-level failure from the HTTP client
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with something other than 200 OK
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// The listing response body could not be parsed
    #[error("Malformed response body: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// Serialization error while encoding a request body
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The identity helper did not produce a usable bearer token
    #[error("Failed to acquire access token: {0}")]
    TokenAcquisition(String),

    /// A single indicator could not be deleted
    #[error("failed to delete indicator with ID {id}: {source}")]
    DeleteFailed {
        id: IndicatorId,
        #[source]
        source: Box<PurgeError>,
    },

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PurgeError {
    /// The HTTP status carried by this error, looking through delete wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            PurgeError::UnexpectedStatus(status) => Some(*status),
            PurgeError::DeleteFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}
