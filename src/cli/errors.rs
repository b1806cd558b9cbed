//! CLI-specific error types
//!
//! Compiler failures keep their own stable codes; the CLI adds codes for
//! the few things only it can get wrong.

use std::fmt;
use std::io;

use crate::schema::{CompileError, CompileErrorCode};
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration or argument error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Catalog already present
    AlreadyInitialized,
    /// No catalog in the data directory
    NotInitialized,
    /// No stored definition for the namespace
    FormNotFound,
    /// Failure reported by the compiler
    Compile(CompileErrorCode),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "FORM_CLI_CONFIG_ERROR",
            Self::IoError => "FORM_CLI_IO_ERROR",
            Self::AlreadyInitialized => "FORM_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "FORM_CLI_NOT_INITIALIZED",
            Self::FormNotFound => "FORM_CLI_NOT_FOUND",
            Self::Compile(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::AlreadyInitialized, msg)
    }

    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::NotInitialized, msg)
    }

    pub fn form_not_found(namespace: &str) -> Self {
        Self::new(
            CliErrorCode::FormNotFound,
            format!("No definition stored for form '{}'", namespace),
        )
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        Self::new(CliErrorCode::Compile(e.code()), e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CompileError::from(e).into()
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
