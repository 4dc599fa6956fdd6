//! In-memory record model for the Emma vault.
//!
//! The decrypted contents of a vault: three keyed collections (memories,
//! people, media) plus derived stats, with a total mutation API. All
//! operations are synchronous and side-effect-free apart from the
//! collections themselves; persistence, encryption, and locking live in
//! `emma-vault`.
//!
//! Mutations either fully apply or fully reject. There is one mutation at
//! a time by design — the store is not internally thread-safe, and all
//! callers route through the single context that owns the unlocked store.

mod error;
mod mutation;
mod records;
mod store;

pub use error::{StoreError, StoreResult};
pub use mutation::{Mutation, MutationOutcome};
pub use records::{
    AttachmentRef, MediaBlob, MemoryMetadata, MemoryPatch, MemoryRecord, NewMedia, NewPerson,
    PersonPatch, PersonRecord, VaultStats,
};
pub use store::RecordStore;
