//! Record shapes held by the vault.
//!
//! These types serialize 1:1 into the plaintext payload of the `.emma`
//! container (top-level keys `memories`, `people`, `media`, `stats`).

use emma_types::{MediaId, MemoryId, PersonId, Timestamp};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Contextual metadata attached to a memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Emotional tone, free-form (e.g., "happy").
    #[serde(default)]
    pub emotion: Option<String>,
    /// Importance score assigned by the companion UI.
    #[serde(default)]
    pub importance: Option<u8>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// People referenced by this memory (soft references).
    #[serde(default)]
    pub people: Vec<PersonId>,
    /// Where the memory happened.
    #[serde(default)]
    pub location: Option<String>,
}

/// Non-owning reference from a memory to a media blob.
///
/// Deleting the blob scrubs every reference; the store enforces this,
/// not callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// The referenced media blob.
    pub id: MediaId,
    /// Media kind, mirrors the blob's MIME type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name at attach time.
    pub name: String,
    /// Blob size at attach time.
    pub size_bytes: u64,
}

/// A single memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub content: String,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// A person known to the vault owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    /// Avatar media blob, scrubbed when the blob is removed.
    #[serde(default)]
    pub avatar_id: Option<MediaId>,
    pub created: Timestamp,
    pub updated: Timestamp,
}

/// A media blob. The payload is raw decoded bytes; encryption applies
/// only when the store is serialized into the container, never twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBlob {
    pub id: MediaId,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created: Timestamp,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// Derived counts over the collections. Always equals the cardinalities
/// and size sums of the live collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    pub memory_count: u64,
    pub people_count: u64,
    pub media_count: u64,
    pub total_size_bytes: u64,
}

/// Input for storing a new media blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedia {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub name: String,
}

/// Input for creating a person record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub avatar_id: Option<MediaId>,
}

/// Partial update for a memory. Absent fields are left untouched; a
/// patch never null-overwrites what it does not mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub importance: Option<u8>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub people: Option<Vec<PersonId>>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Partial update for a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub avatar_id: Option<MediaId>,
}

impl Zeroize for MemoryRecord {
    fn zeroize(&mut self) {
        self.content.zeroize();
        if let Some(emotion) = &mut self.metadata.emotion {
            emotion.zeroize();
        }
        if let Some(location) = &mut self.metadata.location {
            location.zeroize();
        }
        for tag in &mut self.metadata.tags {
            tag.zeroize();
        }
        for attachment in &mut self.attachments {
            attachment.name.zeroize();
        }
    }
}

impl Zeroize for PersonRecord {
    fn zeroize(&mut self) {
        self.name.zeroize();
        if let Some(relation) = &mut self.relation {
            relation.zeroize();
        }
        if let Some(contact) = &mut self.contact {
            contact.zeroize();
        }
    }
}

impl Zeroize for MediaBlob {
    fn zeroize(&mut self) {
        self.name.zeroize();
        self.payload.zeroize();
    }
}

/// Serde adapter storing byte payloads as base64 strings in the JSON
/// payload instead of integer arrays.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
