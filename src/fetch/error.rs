//! Errors from the network collaborators and the bulk job.

use thiserror::Error;

/// Errors from the catalog and preview collaborators.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    /// True for failures worth retrying on a later pass.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

/// Failures that end a bulk job in the `Failed` state.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to list patterns: {0}")]
    Catalog(#[source] FetchError),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job already ran")]
    AlreadyRan,
}
