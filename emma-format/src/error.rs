//! Error types for the container codec.

use thiserror::Error;

/// Result type for codec operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors that can occur while encoding or decoding a `.emma` container.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Not a `.emma` container (bad magic, truncated header).
    #[error("not a valid vault file: {0}")]
    InvalidFormat(String),

    /// Container written by an incompatible major version.
    #[error("unsupported vault version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// Wrong passphrase or tampered ciphertext. Fails closed; no
    /// plaintext is ever returned.
    #[error("wrong passphrase or corrupted vault")]
    Authentication,

    /// Decrypted payload is not a valid record document.
    #[error("corrupt vault payload: {0}")]
    CorruptPayload(String),

    /// Unencrypted legacy vault; only the explicit legacy import
    /// accepts these.
    #[error("unencrypted legacy vault; run the legacy import")]
    LegacyVault,

    /// Encryption-side failure while encoding.
    #[error("crypto failure: {0}")]
    Crypto(String),
}
