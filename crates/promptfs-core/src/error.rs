use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request-level failures.
///
/// Item-level failures never show up here; they are recorded on the
/// corresponding [`crate::OperationResult`] instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or escaping path, rejected before any I/O.
    #[error("Invalid path: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Translator disabled or out of retries.
    #[error("Model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Validation(_) => ErrorCode::Validation,
            CoreError::NotFound(_) => ErrorCode::NotFound,
            CoreError::ServiceUnavailable(_) => ErrorCode::Unavailable,
            CoreError::Io(_) => ErrorCode::Io,
            CoreError::Unexpected(_) => ErrorCode::Internal,
        }
    }
}

/// Machine-readable failure class attached to results and surfaced to callers.
///
/// `Conflict` and `NotADirectory` only occur per item, on an
/// [`crate::OperationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    NotADirectory,
    Unavailable,
    Io,
    Internal,
}

pub type CoreResult<T> = Result<T, CoreError>;
