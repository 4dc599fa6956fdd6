//! Lock/unlock state machine and persistence discipline for Emma vaults.
//!
//! The vault is a single encrypted file shared across process restarts
//! and more than one calling context. This crate owns everything that
//! keeps it consistent:
//!
//! - [`VaultStateMachine`] — the authoritative `Locked | Unlocked` state
//!   plus the decrypted [`RecordStore`](emma_store::RecordStore); all
//!   lifecycle and mutation operations go through it.
//! - [`AtomicFileWriter`] — the file capability; every write is an
//!   atomic replace so the file is never observed half-written.
//! - [`BackupStore`] — one encrypted snapshot of the live store, kept so
//!   losing the file capability does not lose unsaved state.
//! - [`RecoveryCoordinator`] — the one-shot startup pass that rehydrates
//!   an interrupted unlocked session or forces a clean lock.
//! - [`VaultService`] / [`VaultClient`] — the request/response channel
//!   that serializes every other context's operations into the single
//!   capability-owning task.
//!
//! Saving is explicit: mutations mark the store dirty and `flush()`
//! persists the latest state in one atomic write. There are no implicit
//! timers, so tests can force a save deterministically.

mod backup;
mod error;
mod machine;
mod recovery;
mod service;
mod session;
mod state;
mod writer;

pub use backup::{BackupStore, RestoredSnapshot};
pub use error::{VaultError, VaultResult};
pub use machine::{VaultStateMachine, VaultStatus};
pub use recovery::{RecoveryCoordinator, RecoveryOutcome};
pub use service::{ServiceConfig, VaultClient, VaultRequest, VaultResponse, VaultService};
pub use session::SessionCache;
pub use state::VaultState;
pub use writer::{AtomicFileWriter, VaultFile, WriteError};
