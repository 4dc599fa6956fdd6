use emma_types::{MediaId, MemoryId, PersonId, ResumeToken};
use std::collections::HashSet;
use std::str::FromStr;

// ── MemoryId ──────────────────────────────────────────────────────

#[test]
fn memory_id_new_is_unique() {
    let a = MemoryId::new();
    let b = MemoryId::new();
    assert_ne!(a, b);
}

#[test]
fn memory_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = MemoryId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn memory_id_display_and_parse() {
    let id = MemoryId::new();
    let s = id.to_string();
    let parsed = MemoryId::parse(&s).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn memory_id_from_str_invalid() {
    assert!(MemoryId::from_str("garbage").is_err());
}

#[test]
fn memory_id_hash_and_eq() {
    let id = MemoryId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id); // duplicate
    assert_eq!(set.len(), 1);
}

#[test]
fn memory_id_serde_is_transparent() {
    let id = MemoryId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: MemoryId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

// ── PersonId / MediaId ────────────────────────────────────────────

#[test]
fn person_id_display_and_parse() {
    let id = PersonId::new();
    let parsed = PersonId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn media_id_display_and_parse() {
    let id = MediaId::new();
    let parsed = MediaId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn media_id_parse_invalid() {
    assert!(MediaId::parse("not-a-uuid").is_err());
}

// ── ResumeToken ───────────────────────────────────────────────────

#[test]
fn resume_token_new_is_unique() {
    let a = ResumeToken::new();
    let b = ResumeToken::new();
    assert_ne!(a, b);
}

#[test]
fn resume_token_roundtrip() {
    let token = ResumeToken::new();
    let parsed = ResumeToken::from_str(&token.to_string()).unwrap();
    assert_eq!(token, parsed);
}
