//! Error types for courseware-core.

use thiserror::Error;

/// Result type for courseware-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in courseware-core.
///
/// Notebook-level problems (directives, links, i18n) are not errors of this
/// type: they are collected as diagnostics on the notebook and only surface
/// here as [`Error::PublishAborted`] once every check has run.
#[derive(Debug, Error)]
pub enum Error {
    /// The notebook language is not one of python, sql, scala or r.
    #[error("the language {0} is not supported")]
    UnsupportedLanguage(String),

    /// A workspace object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The workspace collaborator failed.
    #[error("workspace error at {path}: {message}")]
    Workspace { path: String, message: String },

    /// Publication of a single notebook was aborted by its diagnostics.
    #[error("publish aborted for {path}: {errors} error(s) found, see previous errors for more information")]
    PublishAborted { path: String, errors: usize },

    /// One or more notebooks failed during a publish pass.
    #[error("publish failed for {} notebook(s): {}", failed.len(), failed.join(", "))]
    PublishFailed { failed: Vec<String> },

    /// A required notebook is missing from the publish set.
    #[error("the required notebook \"{0}\" was not found")]
    RequiredNotebookMissing(String),

    /// An operation requiring prior validation was invoked too early.
    #[error("{0} has not passed validation; call validate() first")]
    NotValidated(&'static str),

    /// Whitelist/blacklist or other configuration inconsistency.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Translation resources are missing or inconsistent.
    #[error("translation error: {0}")]
    Translation(String),

    /// An external collaborator (repo, runner, resolver) failed.
    #[error("external service error: {0}")]
    External(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Workspace`] from any displayable cause.
    pub fn workspace(path: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Workspace {
            path: path.into(),
            message: cause.to_string(),
        }
    }
}
