//! Encode/decode between [`RecordStore`] and the `.emma` byte layout.

use crate::error::{FormatError, FormatResult};
use crate::legacy::LEGACY_SENTINEL;
use emma_crypto::{
    decrypt, derive_key, encrypt, CryptoError, DerivedKey, EncryptedData, KdfParams, Salt,
    NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
use emma_store::RecordStore;

/// Magic bytes identifying a `.emma` container.
pub const FILE_MAGIC: [u8; 4] = *b"EMMA";

/// Current container major version. Unknown majors are rejected.
pub const VERSION_MAJOR: u8 = 1;

/// Current container minor version. Minors are forward-compatible.
pub const VERSION_MINOR: u8 = 0;

/// Fixed header length: magic + version + salt + nonce.
pub const HEADER_LEN: usize = 4 + 2 + SALT_SIZE + NONCE_SIZE;

const SALT_OFFSET: usize = 6;
const NONCE_OFFSET: usize = SALT_OFFSET + SALT_SIZE;

// Shortest well-formed container: header plus the GCM tag of an empty
// payload.
const MIN_CONTAINER_LEN: usize = HEADER_LEN + TAG_SIZE;

/// A successfully decoded container.
#[derive(Debug)]
pub struct DecodedVault {
    /// The decrypted record collections.
    pub records: RecordStore,
    /// The vault's salt, needed to re-encode with the same key.
    pub salt: Salt,
}

/// Serializes and encrypts a record store into container bytes.
///
/// `key` must have been derived from the vault passphrase under `salt`.
pub fn encode(records: &RecordStore, salt: &Salt, key: &DerivedKey) -> FormatResult<Vec<u8>> {
    let payload =
        serde_json::to_vec(records).map_err(|e| FormatError::CorruptPayload(e.to_string()))?;
    let encrypted = encrypt(key, &payload).map_err(|e| FormatError::Crypto(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + encrypted.ciphertext.len());
    bytes.extend_from_slice(&FILE_MAGIC);
    bytes.push(VERSION_MAJOR);
    bytes.push(VERSION_MINOR);
    bytes.extend_from_slice(salt.as_bytes());
    bytes.extend_from_slice(&encrypted.nonce);
    bytes.extend_from_slice(&encrypted.ciphertext);
    Ok(bytes)
}

/// Decrypts and parses container bytes using a passphrase.
///
/// Derives the key from the passphrase and the salt embedded in the
/// header; this is CPU-bound at production iteration counts.
pub fn decode(bytes: &[u8], passphrase: &str, params: &KdfParams) -> FormatResult<DecodedVault> {
    let header = parse_header(bytes)?;
    let key = derive_key(passphrase, &header.salt, params);
    let records = decrypt_payload(&header, &key)?;
    Ok(DecodedVault {
        records,
        salt: header.salt,
    })
}

/// Reads the salt out of a container header without decrypting.
///
/// Lets callers derive the key once and hold on to it, instead of
/// paying derivation inside `decode` and again for their own cache.
pub fn container_salt(bytes: &[u8]) -> FormatResult<Salt> {
    Ok(parse_header(bytes)?.salt)
}

/// Decrypts and parses container bytes with an already-derived key.
///
/// Used on paths that hold the session key (flush verification,
/// passphrase change) to avoid paying key derivation twice.
pub fn decode_with_key(bytes: &[u8], key: &DerivedKey) -> FormatResult<RecordStore> {
    let header = parse_header(bytes)?;
    decrypt_payload(&header, key)
}

struct Header {
    salt: Salt,
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

fn parse_header(bytes: &[u8]) -> FormatResult<Header> {
    // Legacy plaintext vaults start with '{'; tell them apart from
    // garbage so the caller can offer the explicit import.
    if bytes.first() == Some(&LEGACY_SENTINEL) {
        return Err(FormatError::LegacyVault);
    }
    if bytes.len() < MIN_CONTAINER_LEN {
        return Err(FormatError::InvalidFormat(format!(
            "file too short: {} bytes",
            bytes.len()
        )));
    }
    if bytes[..4] != FILE_MAGIC {
        return Err(FormatError::InvalidFormat("bad magic bytes".to_string()));
    }

    let major = bytes[4];
    let minor = bytes[5];
    if major != VERSION_MAJOR {
        return Err(FormatError::UnsupportedVersion { major, minor });
    }

    let mut salt_bytes = [0u8; SALT_SIZE];
    salt_bytes.copy_from_slice(&bytes[SALT_OFFSET..SALT_OFFSET + SALT_SIZE]);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE]);

    Ok(Header {
        salt: Salt::from_bytes(salt_bytes),
        nonce,
        ciphertext: bytes[HEADER_LEN..].to_vec(),
    })
}

fn decrypt_payload(header: &Header, key: &DerivedKey) -> FormatResult<RecordStore> {
    let encrypted = EncryptedData {
        nonce: header.nonce,
        ciphertext: header.ciphertext.clone(),
    };
    let plaintext = decrypt(key, &encrypted).map_err(|e| match e {
        CryptoError::Decryption(_) => FormatError::Authentication,
        other => FormatError::Crypto(other.to_string()),
    })?;

    serde_json::from_slice(&plaintext).map_err(|e| FormatError::CorruptPayload(e.to_string()))
}
