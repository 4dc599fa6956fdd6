//! Error types for the record model.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when mutating the record model.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Mutation input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced record id is absent.
    #[error("record not found: {0}")]
    NotFound(String),
}
