//! The decrypted record collections and their mutation API.

use crate::error::{StoreError, StoreResult};
use crate::records::{
    AttachmentRef, MediaBlob, MemoryMetadata, MemoryPatch, MemoryRecord, NewMedia, NewPerson,
    PersonPatch, PersonRecord, VaultStats,
};
use emma_types::{MediaId, MemoryId, PersonId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zeroize::Zeroize;

/// The in-memory contents of an unlocked vault.
///
/// Created empty by vault creation, populated wholesale by unlock,
/// mutated one operation at a time, and zeroized on lock — the
/// collections hold plaintext family data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStore {
    #[serde(default)]
    memories: HashMap<MemoryId, MemoryRecord>,
    #[serde(default)]
    people: HashMap<PersonId, PersonRecord>,
    #[serde(default)]
    media: HashMap<MediaId, MediaBlob>,
    #[serde(default)]
    stats: VaultStats,
}

impl RecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read access ──────────────────────────────────────────────

    /// Returns a memory by id.
    pub fn memory(&self, id: MemoryId) -> Option<&MemoryRecord> {
        self.memories.get(&id)
    }

    /// Returns a person by id.
    pub fn person(&self, id: PersonId) -> Option<&PersonRecord> {
        self.people.get(&id)
    }

    /// Returns a media blob by id.
    pub fn media(&self, id: MediaId) -> Option<&MediaBlob> {
        self.media.get(&id)
    }

    /// Iterates all memories in unspecified order.
    pub fn memories(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.memories.values()
    }

    /// Iterates all people in unspecified order.
    pub fn people(&self) -> impl Iterator<Item = &PersonRecord> {
        self.people.values()
    }

    /// Iterates all media blobs in unspecified order.
    pub fn media_blobs(&self) -> impl Iterator<Item = &MediaBlob> {
        self.media.values()
    }

    /// Returns the derived stats.
    pub fn stats(&self) -> VaultStats {
        self.stats
    }

    /// True when every collection is empty.
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.people.is_empty() && self.media.is_empty()
    }

    // ── Memory mutations ─────────────────────────────────────────

    /// Adds a memory, storing its attachment blobs first so their ids
    /// exist when the `AttachmentRef`s are built.
    ///
    /// Rejects a memory with empty content and no attachments.
    pub fn add_memory(
        &mut self,
        content: String,
        metadata: MemoryMetadata,
        attachments: Vec<NewMedia>,
    ) -> StoreResult<MemoryId> {
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(StoreError::Validation(
                "memory needs content or at least one attachment".to_string(),
            ));
        }

        let mut refs = Vec::with_capacity(attachments.len());
        for blob in attachments {
            let size_bytes = blob.bytes.len() as u64;
            let kind = blob.mime_type.clone();
            let name = blob.name.clone();
            let id = self.add_media(blob.bytes, blob.mime_type, blob.name)?;
            refs.push(AttachmentRef {
                id,
                kind,
                name,
                size_bytes,
            });
        }

        let id = MemoryId::new();
        let now = Timestamp::now();
        self.memories.insert(
            id,
            MemoryRecord {
                id,
                created: now,
                updated: now,
                content,
                metadata,
                attachments: refs,
            },
        );
        self.stats.memory_count += 1;
        Ok(id)
    }

    /// Merges the provided patch fields into a memory. Fields the patch
    /// does not mention are left untouched.
    pub fn update_memory(&mut self, id: MemoryId, patch: MemoryPatch) -> StoreResult<()> {
        let record = self
            .memories
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(emotion) = patch.emotion {
            record.metadata.emotion = Some(emotion);
        }
        if let Some(importance) = patch.importance {
            record.metadata.importance = Some(importance);
        }
        if let Some(tags) = patch.tags {
            record.metadata.tags = tags;
        }
        if let Some(people) = patch.people {
            record.metadata.people = people;
        }
        if let Some(location) = patch.location {
            record.metadata.location = Some(location);
        }
        record.updated = Timestamp::now();
        Ok(())
    }

    /// Removes a memory. Its media blobs stay — they may be referenced
    /// by other records or retained for undo.
    pub fn delete_memory(&mut self, id: MemoryId) -> StoreResult<()> {
        let mut record = self
            .memories
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.zeroize();
        self.stats.memory_count -= 1;
        Ok(())
    }

    // ── Person mutations ─────────────────────────────────────────

    /// Adds a person. A supplied avatar must reference an existing blob.
    pub fn add_person(&mut self, person: NewPerson) -> StoreResult<PersonId> {
        if person.name.trim().is_empty() {
            return Err(StoreError::Validation("person needs a name".to_string()));
        }
        if let Some(avatar) = person.avatar_id {
            if !self.media.contains_key(&avatar) {
                return Err(StoreError::NotFound(avatar.to_string()));
            }
        }

        let id = PersonId::new();
        let now = Timestamp::now();
        self.people.insert(
            id,
            PersonRecord {
                id,
                name: person.name,
                relation: person.relation,
                contact: person.contact,
                avatar_id: person.avatar_id,
                created: now,
                updated: now,
            },
        );
        self.stats.people_count += 1;
        Ok(id)
    }

    /// Merges the provided patch fields into a person record.
    pub fn update_person(&mut self, id: PersonId, patch: PersonPatch) -> StoreResult<()> {
        if let Some(avatar) = patch.avatar_id {
            if !self.media.contains_key(&avatar) {
                return Err(StoreError::NotFound(avatar.to_string()));
            }
        }
        let record = self
            .people
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(StoreError::Validation("person needs a name".to_string()));
            }
            record.name = name;
        }
        if let Some(relation) = patch.relation {
            record.relation = Some(relation);
        }
        if let Some(contact) = patch.contact {
            record.contact = Some(contact);
        }
        if let Some(avatar) = patch.avatar_id {
            record.avatar_id = Some(avatar);
        }
        record.updated = Timestamp::now();
        Ok(())
    }

    /// Removes a person. Memories referencing them keep their soft
    /// references.
    pub fn delete_person(&mut self, id: PersonId) -> StoreResult<()> {
        let mut record = self
            .people
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.zeroize();
        self.stats.people_count -= 1;
        Ok(())
    }

    // ── Media mutations ──────────────────────────────────────────

    /// Stores a media blob and returns its id.
    pub fn add_media(
        &mut self,
        bytes: Vec<u8>,
        mime_type: String,
        name: String,
    ) -> StoreResult<MediaId> {
        let id = MediaId::new();
        let size_bytes = bytes.len() as u64;
        self.media.insert(
            id,
            MediaBlob {
                id,
                name,
                mime_type,
                size_bytes,
                created: Timestamp::now(),
                payload: bytes,
            },
        );
        self.stats.media_count += 1;
        self.stats.total_size_bytes += size_bytes;
        Ok(id)
    }

    /// Removes a media blob, scrubbing every `AttachmentRef` and every
    /// `avatar_id` that points at it before dropping the payload.
    pub fn remove_media(&mut self, id: MediaId) -> StoreResult<()> {
        let mut blob = self
            .media
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        for memory in self.memories.values_mut() {
            memory.attachments.retain(|a| a.id != id);
        }
        for person in self.people.values_mut() {
            if person.avatar_id == Some(id) {
                person.avatar_id = None;
            }
        }

        self.stats.media_count -= 1;
        self.stats.total_size_bytes -= blob.size_bytes;
        blob.zeroize();
        Ok(())
    }

    // ── Maintenance ──────────────────────────────────────────────

    /// Recomputes the derived stats from the collections. Used after
    /// importing payloads whose stats block cannot be trusted.
    pub fn recompute_stats(&mut self) {
        self.stats = VaultStats {
            memory_count: self.memories.len() as u64,
            people_count: self.people.len() as u64,
            media_count: self.media.len() as u64,
            total_size_bytes: self.media.values().map(|b| b.size_bytes).sum(),
        };
    }

    /// Overwrites all plaintext content before the collections are
    /// dropped. Called on lock; also runs on drop.
    pub fn zeroize_contents(&mut self) {
        for memory in self.memories.values_mut() {
            memory.zeroize();
        }
        for person in self.people.values_mut() {
            person.zeroize();
        }
        for blob in self.media.values_mut() {
            blob.zeroize();
        }
        self.memories.clear();
        self.people.clear();
        self.media.clear();
        self.stats = VaultStats::default();
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        self.zeroize_contents();
    }
}
