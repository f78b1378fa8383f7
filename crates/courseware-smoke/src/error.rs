//! Error types for courseware-smoke.

use thiserror::Error;

/// Result type for smoke-test operations.
pub type SmokeResult<T> = std::result::Result<T, SmokeError>;

/// Errors that can occur while orchestrating smoke tests.
#[derive(Debug, Error)]
pub enum SmokeError {
    /// Failure in the core pipeline (workspace access, configuration).
    #[error(transparent)]
    Core(#[from] courseware_core::Error),

    /// The suite was set up inconsistently.
    #[error("invalid test suite: {0}")]
    InvalidSuite(String),

    /// A notebook under test was not published.
    #[error("Notebook not found: {0}")]
    NotebookNotFound(String),

    /// The requested cluster policy is unknown or not accessible.
    #[error("The policy \"{policy_id}\" does not exist or you do not have permissions to use specified policy: {available:?}")]
    PolicyNotFound {
        policy_id: String,
        available: Vec<String>,
    },

    /// No workspace is known for the cloud.
    #[error("The cloud {0} is not supported")]
    UnsupportedCloud(String),

    /// The job service could not run the notebook at all.
    #[error("run {run_id} ended with an internal error: {message}")]
    InternalError { run_id: u64, message: String },

    /// A remote collaborator (jobs, notifications, result store) failed.
    #[error("service error: {0}")]
    Service(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
