//! Orchestrator-specific error types

use shared::{JobId, ProfileId, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Failed to open session for {profile}: {reason}")]
    SessionOpenFailed { profile: ProfileId, reason: String },

    #[error("Failed to persist applied job {job_id} to {path}: {message}")]
    DedupPersistence { job_id: JobId, path: String, message: String },

    #[error("Job {job_id} is not reserved by {profile}")]
    NotReserved { job_id: JobId, profile: ProfileId },

    #[error("Application attempt for job {job_id} failed: {message}")]
    ApplyFailed { job_id: JobId, message: String },

    #[error("Listing candidates for '{task}' failed: {message}")]
    CandidateListing { task: String, message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("File system operation failed: {operation} on {path}")]
    FileSystemError { operation: String, path: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        OrchestratorError::ConfigurationError { field: field.into() }
    }

    /// Whether repeating the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::DedupPersistence { .. } | OrchestratorError::IoError(_)
        )
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
