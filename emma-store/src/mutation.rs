//! Typed mutation operations.
//!
//! Mirrors the mutation API of [`RecordStore`](crate::RecordStore) as a
//! serializable enum so contexts without the file capability can send
//! mutations over the request/response channel instead of mutating a
//! store of their own.

use crate::error::StoreResult;
use crate::records::{MemoryMetadata, MemoryPatch, NewMedia, NewPerson, PersonPatch};
use crate::store::RecordStore;
use emma_types::{MediaId, MemoryId, PersonId};
use serde::{Deserialize, Serialize};

/// A single mutation against the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum Mutation {
    /// Add a memory (attachment blobs are stored first).
    AddMemory {
        content: String,
        #[serde(default)]
        metadata: MemoryMetadata,
        #[serde(default)]
        attachments: Vec<NewMedia>,
    },

    /// Merge a patch into an existing memory.
    UpdateMemory { id: MemoryId, patch: MemoryPatch },

    /// Remove a memory (its media stays).
    DeleteMemory { id: MemoryId },

    /// Add a person record.
    AddPerson { person: NewPerson },

    /// Merge a patch into an existing person.
    UpdatePerson { id: PersonId, patch: PersonPatch },

    /// Remove a person (memories keep their soft references).
    DeletePerson { id: PersonId },

    /// Store a standalone media blob.
    AddMedia { media: NewMedia },

    /// Remove a media blob and scrub all references to it.
    RemoveMedia { id: MediaId },
}

/// What a successfully applied mutation produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MutationOutcome {
    /// A memory was created.
    MemoryAdded(MemoryId),
    /// A person was created.
    PersonAdded(PersonId),
    /// A media blob was stored.
    MediaAdded(MediaId),
    /// The mutation applied without creating a record.
    Applied,
}

impl Mutation {
    /// Applies the mutation to a store. Fully applies or fully rejects.
    pub fn apply(self, store: &mut RecordStore) -> StoreResult<MutationOutcome> {
        match self {
            Mutation::AddMemory {
                content,
                metadata,
                attachments,
            } => store
                .add_memory(content, metadata, attachments)
                .map(MutationOutcome::MemoryAdded),
            Mutation::UpdateMemory { id, patch } => store
                .update_memory(id, patch)
                .map(|()| MutationOutcome::Applied),
            Mutation::DeleteMemory { id } => {
                store.delete_memory(id).map(|()| MutationOutcome::Applied)
            }
            Mutation::AddPerson { person } => {
                store.add_person(person).map(MutationOutcome::PersonAdded)
            }
            Mutation::UpdatePerson { id, patch } => store
                .update_person(id, patch)
                .map(|()| MutationOutcome::Applied),
            Mutation::DeletePerson { id } => {
                store.delete_person(id).map(|()| MutationOutcome::Applied)
            }
            Mutation::AddMedia { media } => store
                .add_media(media.bytes, media.mime_type, media.name)
                .map(MutationOutcome::MediaAdded),
            Mutation::RemoveMedia { id } => {
                store.remove_media(id).map(|()| MutationOutcome::Applied)
            }
        }
    }
}
