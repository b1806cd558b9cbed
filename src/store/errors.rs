//! # Persistence Errors

use thiserror::Error;

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a persistence backend.
///
/// `WidthOverflow` is the only variant that means "this table has too many
/// columns"; every other variant is an unrelated backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Table {table} is too wide: {columns} columns (limit: {limit})")]
    WidthOverflow {
        table: String,
        columns: usize,
        limit: usize,
    },

    #[error("Table already exists: {0}")]
    AlreadyExists(String),

    #[error("Table not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt catalog: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether the failure signals a table wider than the backend allows
    pub fn is_width_overflow(&self) -> bool {
        matches!(self, StoreError::WidthOverflow { .. })
    }

    /// Whether a retry of the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::QuotaExceeded(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}
