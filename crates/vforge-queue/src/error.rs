//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job was cancelled")]
    JobCancelled,

    #[error("Timed out after {0:?} waiting for job")]
    WaitTimeout(std::time::Duration),

    #[error("Provider error: {0}")]
    Provider(#[from] vforge_fal::FalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn job_not_found(id: impl std::fmt::Display) -> Self {
        Self::JobNotFound(id.to_string())
    }
}
