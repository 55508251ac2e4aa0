use thiserror::Error;

use super::types::JobId;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Scan queue is full ({depth} jobs waiting)")]
    QueueFull { depth: usize },

    #[error("Invalid checker selection: {0}")]
    InvalidCheckers(String),

    #[error("Timeout must be greater than zero and within range")]
    InvalidTimeout,

    #[error("Scan controller has shut down")]
    ShutDown,
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Unknown scan job: {0}")]
    UnknownJob(JobId),

    #[error("Scan job {0} has not finished")]
    NotFinished(JobId),

    #[error("Timed out waiting for scan job {0}")]
    WaitTimedOut(JobId),

    #[error("Scan controller requires a tokio runtime")]
    NoRuntime,

    #[error("Result store error: {0}")]
    ResultStore(#[from] ResultStoreError),
}

#[derive(Error, Debug)]
pub enum ResultStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No stored result for job {0}")]
    NotFound(JobId),

    #[error("Job {0} already has a stored outcome")]
    AlreadyExists(JobId),

    #[error("Stored result belongs to job {found}, expected {expected}")]
    Mismatch { expected: JobId, found: JobId },
}
