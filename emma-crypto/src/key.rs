//! Key derivation and management.
//!
//! Uses PBKDF2-HMAC-SHA256 for deriving encryption keys from passphrases.
//! Derivation is deterministic for a given (passphrase, salt) pair so the
//! same vault file can be re-opened; the salt is generated once per vault
//! at creation time and never changes afterwards.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of encryption keys in bytes (256 bits for AES-256-GCM).
pub const KEY_SIZE: usize = 32;

/// Size of salt in bytes.
pub const SALT_SIZE: usize = 32;

/// A derived encryption key with automatic zeroization on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a new derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Salt for key derivation. Fixed for the lifetime of a vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    /// Generates a random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a salt from raw bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }
}

/// Key derivation parameters.
#[derive(Clone, Debug)]
pub struct KdfParams {
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // Keeps derivation well under a second on desktop hardware while
        // staying above OWASP's PBKDF2-HMAC-SHA256 floor (2023).
        Self {
            iterations: 250_000,
        }
    }
}

impl KdfParams {
    /// Creates parameters for testing (fast but insecure).
    pub fn fast_insecure() -> Self {
        Self { iterations: 1_000 }
    }
}

/// Derives an encryption key from a passphrase using PBKDF2-HMAC-SHA256.
///
/// Deterministic for a given (passphrase, salt, iterations) triple. This
/// is CPU-bound and may take a noticeable fraction of a second at the
/// default iteration count.
///
/// # Arguments
/// * `passphrase` - The user's passphrase
/// * `salt` - The vault's salt
/// * `params` - Key derivation parameters
///
/// # Returns
/// A derived key suitable for use with AES-256-GCM.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> DerivedKey {
    let mut key_bytes = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        &mut key_bytes,
    );

    DerivedKey::from_bytes(key_bytes)
}

/// Generates a random encryption key (not passphrase-derived).
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}
