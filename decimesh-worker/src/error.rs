//! Errors seen by callers of the decimation worker

use std::time::Duration;
use thiserror::Error;

/// Failure of a decimation request as observed by the caller
#[derive(Error, Debug)]
pub enum DecimateError {
    /// The worker ran the job and reported a processing failure
    #[error("{message}")]
    Worker { message: String },

    /// The source bytes could not be retrieved; nothing was sent
    #[error("Fetch failed: {0}")]
    Fetch(#[source] decimesh_core::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("No reply from the worker within {0:?}")]
    Timeout(Duration),

    #[error("Worker disconnected")]
    Disconnected,
}

/// Result type alias for worker client operations
pub type Result<T> = std::result::Result<T, DecimateError>;
