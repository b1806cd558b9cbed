//! Compiler error types
//!
//! Error codes:
//! - FORM_INPUT_INVALID (REJECT)
//! - FORM_ALREADY_DEFINED (REJECT)
//! - FORM_CONFIG_INVALID (REJECT)
//! - FORM_NON_CONVERGENCE (FATAL)
//! - FORM_STORE_FAILED (FATAL)
//! - FORM_INVARIANT_VIOLATED (FATAL)
//!
//! Every FATAL error raised after the provisional form record has been
//! written leaves the store as it was before compilation began.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Severity levels for compile errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller can fix the input and retry
    Reject,
    /// Compilation aborted and rolled back
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable error codes reported to callers and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorCode {
    InputInvalid,
    AlreadyDefined,
    ConfigInvalid,
    NonConvergence,
    StoreFailed,
    InvariantViolated,
}

impl CompileErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorCode::InputInvalid => "FORM_INPUT_INVALID",
            CompileErrorCode::AlreadyDefined => "FORM_ALREADY_DEFINED",
            CompileErrorCode::ConfigInvalid => "FORM_CONFIG_INVALID",
            CompileErrorCode::NonConvergence => "FORM_NON_CONVERGENCE",
            CompileErrorCode::StoreFailed => "FORM_STORE_FAILED",
            CompileErrorCode::InvariantViolated => "FORM_INVARIANT_VIOLATED",
        }
    }

    /// Returns the severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            CompileErrorCode::InputInvalid
            | CompileErrorCode::AlreadyDefined
            | CompileErrorCode::ConfigInvalid => Severity::Reject,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised while compiling a form into physical tables
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid form input at '{path}': {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("form '{namespace}' is already defined with a different structure")]
    AlreadyDefined { namespace: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to subdivide table '{table}': {reason}")]
    Unsplittable { table: String, reason: String },

    #[error("table split loop did not converge after {iterations} iterations (still overflowing: {pending:?})")]
    IterationCapExceeded {
        iterations: usize,
        pending: Vec<String>,
    },

    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),

    #[error("record set invariant violated: {0}")]
    InvariantViolated(String),
}

impl CompileError {
    /// Create an input error for the element at `path`
    pub fn invalid_input(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a non-convergence error for a table that cannot be split further
    pub fn unsplittable(table: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::Unsplittable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        CompileError::InvariantViolated(message.into())
    }

    /// Returns the error code
    pub fn code(&self) -> CompileErrorCode {
        match self {
            CompileError::InvalidInput { .. } => CompileErrorCode::InputInvalid,
            CompileError::AlreadyDefined { .. } => CompileErrorCode::AlreadyDefined,
            CompileError::InvalidConfig(_) => CompileErrorCode::ConfigInvalid,
            CompileError::Unsplittable { .. } | CompileError::IterationCapExceeded { .. } => {
                CompileErrorCode::NonConvergence
            }
            CompileError::Store(_) => CompileErrorCode::StoreFailed,
            CompileError::InvariantViolated(_) => CompileErrorCode::InvariantViolated,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether the split loop failed to converge
    pub fn is_non_convergence(&self) -> bool {
        self.code() == CompileErrorCode::NonConvergence
    }
}

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CompileErrorCode::InputInvalid.code(), "FORM_INPUT_INVALID");
        assert_eq!(CompileErrorCode::NonConvergence.code(), "FORM_NON_CONVERGENCE");
        assert_eq!(CompileErrorCode::StoreFailed.code(), "FORM_STORE_FAILED");
        assert_eq!(CompileErrorCode::AlreadyDefined.code(), "FORM_ALREADY_DEFINED");
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(CompileErrorCode::InputInvalid.severity(), Severity::Reject);
        assert_eq!(CompileErrorCode::NonConvergence.severity(), Severity::Fatal);
        assert_eq!(CompileErrorCode::InvariantViolated.severity(), Severity::Fatal);
    }

    #[test]
    fn test_both_convergence_failures_share_a_code() {
        let small = CompileError::unsplittable("FORM_CORE", "only 1 column");
        let capped = CompileError::IterationCapExceeded {
            iterations: 3,
            pending: vec!["FORM_CORE".into()],
        };
        assert!(small.is_non_convergence());
        assert!(capped.is_non_convergence());
        assert!(capped.to_string().contains("FORM_CORE"));
    }

    #[test]
    fn test_store_error_is_fatal() {
        let err: CompileError = StoreError::Unavailable("connection reset".into()).into();
        assert!(err.is_fatal());
        assert_eq!(err.code(), CompileErrorCode::StoreFailed);
    }
}
