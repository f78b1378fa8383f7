//! Error and warning lists accumulated while publishing a notebook.

use std::fmt;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts publication of the notebook once all checks have run.
    Error,
    /// Reported, never fatal.
    Warning,
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered error and warning lists.
///
/// Checks are evaluated at the call site and recorded immediately; nothing
/// short-circuits, so one pass surfaces the complete set of problems.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless `passed`. Returns `passed`.
    pub fn test(&mut self, passed: bool, message: impl Into<String>) -> bool {
        if !passed {
            self.error(message);
        }
        passed
    }

    /// Record a warning unless `passed`. Returns `passed`.
    pub fn warn(&mut self, passed: bool, message: impl Into<String>) -> bool {
        if !passed {
            self.warning(message);
        }
        passed
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    /// Log every warning through `tracing`.
    pub fn log_warnings(&self, path: &str) {
        if self.warnings.is_empty() {
            return;
        }
        let what = if self.warnings.len() == 1 {
            "warning was"
        } else {
            "warnings were"
        };
        tracing::warn!(
            "CAUTION: {} {} found while publishing {}",
            self.warnings.len(),
            what,
            path
        );
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }

    /// Log every error through `tracing`.
    pub fn log_errors(&self, path: &str) {
        let what = if self.errors.len() == 1 {
            "error was"
        } else {
            "errors were"
        };
        tracing::error!(
            "ABORTING: {} {} found while publishing {}",
            self.errors.len(),
            what,
            path
        );
        for error in &self.errors {
            tracing::error!("{}", error);
        }
    }
}
