//! Encryption layer for the Emma vault.
//!
//! Two primitives, no vault semantics:
//! - Key derivation: PBKDF2-HMAC-SHA256 from a passphrase and a per-vault
//!   salt (`key` module)
//! - Authenticated encryption: AES-256-GCM over opaque byte buffers
//!   (`cipher` module)
//!
//! The `.emma` container format fixes both algorithms, so they are not
//! pluggable here.

mod cipher;
mod error;
mod key;

pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
