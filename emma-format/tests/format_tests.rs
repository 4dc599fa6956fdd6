use emma_crypto::{derive_key, encrypt, KdfParams, Salt};
use emma_format::{
    decode, decode_with_key, encode, import_legacy, is_legacy, FormatError, FILE_MAGIC,
    HEADER_LEN, VERSION_MAJOR, VERSION_MINOR,
};
use emma_store::{MemoryMetadata, NewPerson, RecordStore};

const PASSPHRASE: &str = "correct horse battery staple";

fn params() -> KdfParams {
    KdfParams::fast_insecure()
}

fn sample_store() -> RecordStore {
    let mut store = RecordStore::new();
    store
        .add_memory(
            "First day of school".to_string(),
            MemoryMetadata {
                emotion: Some("happy".to_string()),
                ..Default::default()
            },
            vec![],
        )
        .unwrap();
    store
        .add_person(NewPerson {
            name: "Sam".to_string(),
            relation: Some("daughter".to_string()),
            ..Default::default()
        })
        .unwrap();
    store
        .add_media(vec![0xFF, 0xD8, 1, 2, 3], "image/jpeg".to_string(), "p.jpg".to_string())
        .unwrap();
    store
}

fn encode_sample(store: &RecordStore) -> (Vec<u8>, Salt) {
    let salt = Salt::random();
    let key = derive_key(PASSPHRASE, &salt, &params());
    let bytes = encode(store, &salt, &key).unwrap();
    (bytes, salt)
}

// ── Round-trip ───────────────────────────────────────────────────

#[test]
fn encode_decode_roundtrip() {
    let store = sample_store();
    let (bytes, salt) = encode_sample(&store);

    let decoded = decode(&bytes, PASSPHRASE, &params()).unwrap();
    assert_eq!(decoded.records, store);
    assert_eq!(decoded.salt.as_bytes(), salt.as_bytes());
}

#[test]
fn decode_with_key_roundtrip() {
    let store = sample_store();
    let (bytes, salt) = encode_sample(&store);
    let key = derive_key(PASSPHRASE, &salt, &params());

    let decoded = decode_with_key(&bytes, &key).unwrap();
    assert_eq!(decoded, store);
}

#[test]
fn empty_store_roundtrip() {
    let store = RecordStore::new();
    let (bytes, _) = encode_sample(&store);
    let decoded = decode(&bytes, PASSPHRASE, &params()).unwrap();
    assert!(decoded.records.is_empty());
}

// ── Header layout ────────────────────────────────────────────────

#[test]
fn header_carries_magic_version_and_salt() {
    let (bytes, salt) = encode_sample(&RecordStore::new());

    assert_eq!(&bytes[..4], &FILE_MAGIC);
    assert_eq!(bytes[4], VERSION_MAJOR);
    assert_eq!(bytes[5], VERSION_MINOR);
    assert_eq!(&bytes[6..38], salt.as_bytes());
    assert!(bytes.len() > HEADER_LEN);
}

#[test]
fn two_encodes_differ_in_nonce_and_ciphertext() {
    let store = sample_store();
    let salt = Salt::random();
    let key = derive_key(PASSPHRASE, &salt, &params());

    let a = encode(&store, &salt, &key).unwrap();
    let b = encode(&store, &salt, &key).unwrap();
    assert_eq!(a[..38], b[..38]); // header up to nonce is identical
    assert_ne!(a[38..50], b[38..50]);
}

// ── Rejection paths ──────────────────────────────────────────────

#[test]
fn wrong_passphrase_is_authentication_error() {
    let (bytes, _) = encode_sample(&sample_store());
    let result = decode(&bytes, "wrong-pass", &params());
    assert!(matches!(result, Err(FormatError::Authentication)));
}

#[test]
fn bad_magic_is_invalid_format() {
    let (mut bytes, _) = encode_sample(&sample_store());
    bytes[0] = b'X';
    let result = decode(&bytes, PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::InvalidFormat(_))));
}

#[test]
fn unknown_major_version_is_rejected() {
    let (mut bytes, _) = encode_sample(&sample_store());
    bytes[4] = VERSION_MAJOR + 1;
    let result = decode(&bytes, PASSPHRASE, &params());
    assert!(matches!(
        result,
        Err(FormatError::UnsupportedVersion { minor: 0, .. })
    ));
}

#[test]
fn newer_minor_version_still_decodes() {
    let (mut bytes, _) = encode_sample(&sample_store());
    bytes[5] = VERSION_MINOR + 3;
    assert!(decode(&bytes, PASSPHRASE, &params()).is_ok());
}

#[test]
fn truncated_file_is_invalid_format() {
    let (bytes, _) = encode_sample(&sample_store());
    let result = decode(&bytes[..HEADER_LEN + 4], PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::InvalidFormat(_))));
}

#[test]
fn empty_file_is_invalid_format() {
    let result = decode(&[], PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::InvalidFormat(_))));
}

#[test]
fn every_flipped_byte_in_nonce_or_ciphertext_fails_closed() {
    let (bytes, _) = encode_sample(&sample_store());

    // Offset 38 is the start of the nonce; everything after it is
    // authenticated material.
    for pos in 38..bytes.len() {
        let mut tampered = bytes.clone();
        tampered[pos] ^= 0x01;
        let result = decode(&tampered, PASSPHRASE, &params());
        assert!(
            matches!(result, Err(FormatError::Authentication)),
            "byte {pos} did not fail closed"
        );
    }
}

#[test]
fn flipped_salt_byte_fails_as_authentication() {
    // A tampered salt derives the wrong key, so the tag check fails.
    let (mut bytes, _) = encode_sample(&sample_store());
    bytes[6] ^= 0xFF;
    let result = decode(&bytes, PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::Authentication)));
}

#[test]
fn valid_container_with_non_record_payload_is_corrupt() {
    let salt = Salt::random();
    let key = derive_key(PASSPHRASE, &salt, &params());
    let encrypted = encrypt(&key, b"[1, 2, 3]").unwrap();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&FILE_MAGIC);
    bytes.push(VERSION_MAJOR);
    bytes.push(VERSION_MINOR);
    bytes.extend_from_slice(salt.as_bytes());
    bytes.extend_from_slice(&encrypted.nonce);
    bytes.extend_from_slice(&encrypted.ciphertext);

    let result = decode(&bytes, PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::CorruptPayload(_))));
}

// ── Legacy vaults ────────────────────────────────────────────────

#[test]
fn decode_refuses_legacy_plaintext() {
    let legacy = serde_json::to_vec(&RecordStore::new()).unwrap();
    assert!(is_legacy(&legacy));

    let result = decode(&legacy, PASSPHRASE, &params());
    assert!(matches!(result, Err(FormatError::LegacyVault)));
}

#[test]
fn import_legacy_parses_and_recomputes_stats() {
    let mut store = RecordStore::new();
    store
        .add_memory("legacy memory".to_string(), MemoryMetadata::default(), vec![])
        .unwrap();
    let json = serde_json::to_vec(&store).unwrap();

    let imported = import_legacy(&json).unwrap();
    assert_eq!(imported.stats().memory_count, 1);
    assert_eq!(
        imported.memories().next().unwrap().content,
        "legacy memory"
    );
}

#[test]
fn import_legacy_rejects_encrypted_container() {
    let (bytes, _) = encode_sample(&sample_store());
    assert!(matches!(
        import_legacy(&bytes),
        Err(FormatError::InvalidFormat(_))
    ));
}

#[test]
fn import_legacy_rejects_malformed_json() {
    let result = import_legacy(b"{not json");
    assert!(matches!(result, Err(FormatError::CorruptPayload(_))));
}
