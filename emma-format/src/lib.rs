//! Binary container codec for `.emma` vault files.
//!
//! Layout (all offsets in bytes, integers big-endian):
//!
//! ```text
//! offset 0   len 4   magic bytes "EMMA"
//! offset 4   len 2   version (major, minor)
//! offset 6   len 32  salt (PBKDF2 input)
//! offset 38  len 12  AES-GCM nonce
//! offset 50  len N   AES-256-GCM ciphertext (16-byte tag at end)
//! ```
//!
//! The plaintext payload is the JSON serialization of
//! [`RecordStore`](emma_store::RecordStore). Decoding never partially
//! applies: any error aborts with no observable side effect.
//!
//! Files beginning with `{` are unencrypted legacy vaults. `decode`
//! refuses them — silently trusting unauthenticated plaintext would
//! undercut the rest of the format — and callers route them through the
//! explicit [`import_legacy`] operation instead.

mod container;
mod error;
mod legacy;

pub use container::{
    container_salt, decode, decode_with_key, encode, DecodedVault, FILE_MAGIC, HEADER_LEN,
    VERSION_MAJOR, VERSION_MINOR,
};
pub use error::{FormatError, FormatResult};
pub use legacy::{import_legacy, is_legacy, LEGACY_SENTINEL};
