//! Error types for the vault layer.

use emma_format::FormatError;
use emma_store::StoreError;
use emma_storage::StorageError;
use thiserror::Error;

use crate::writer::WriteError;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors surfaced by the vault state machine and service.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Mutation or flush attempted while locked.
    #[error("vault is locked")]
    Locked,

    /// Create/unlock attempted while already unlocked.
    #[error("vault is already unlocked")]
    AlreadyUnlocked,

    /// Wrong passphrase (or tampered data — indistinguishable by
    /// design; nothing decrypts either way).
    #[error("wrong passphrase")]
    Authentication,

    /// Container codec failure other than authentication.
    #[error(transparent)]
    Format(FormatError),

    /// Record model rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Durable state or snapshot storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Vault file capability failure.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Encryption-side failure while snapshotting.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// Snapshot payload failed to (de)serialize.
    #[error("snapshot payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Explicit recovery found no backup snapshot to restore from.
    #[error("no backup snapshot available")]
    NoSnapshot,

    /// Cross-context request exceeded its timeout. The operation may or
    /// may not have run; the caller must not assume success.
    #[error("vault request timed out")]
    Timeout,

    /// The vault service is gone.
    #[error("vault service unavailable")]
    ServiceUnavailable,
}

impl VaultError {
    /// Maps codec errors, folding authentication failures into the
    /// user-visible "wrong passphrase" variant.
    pub(crate) fn from_format(err: FormatError) -> Self {
        match err {
            FormatError::Authentication => VaultError::Authentication,
            other => VaultError::Format(other),
        }
    }
}
