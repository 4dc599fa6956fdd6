//! Core type definitions for the Emma vault.
//!
//! This crate defines the fundamental, UI-agnostic types used throughout
//! the vault core:
//! - Record and snapshot identifiers (UUID v7)
//! - Epoch-millisecond timestamps
//!
//! Domain-specific record shapes (memories, people, media) belong to
//! `emma-store`, not here.

mod ids;
mod timestamp;

pub use ids::{MediaId, MemoryId, PersonId, ResumeToken};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
