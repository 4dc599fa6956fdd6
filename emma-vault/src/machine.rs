//! The authoritative lock/unlock state machine.
//!
//! Owns the decrypted [`RecordStore`] and coordinates the crypto engine,
//! container codec, atomic writer, backup store, and durable state. One
//! instance per process; every operation runs to completion before the
//! next starts (the service layer serializes callers).
//!
//! Saving is explicit: mutations mark the store dirty, and [`flush`]
//! performs the single atomic write that persists the latest in-memory
//! state. Flushing coalesces any number of mutations but never persists
//! an intermediate state. A failed write rolls the store back to the
//! last persisted state and surfaces the error — no silent retry, since
//! retrying after an unknown partial failure can mask data loss.
//!
//! [`flush`]: VaultStateMachine::flush

use crate::backup::BackupStore;
use crate::error::{VaultError, VaultResult};
use crate::session::SessionCache;
use crate::state::{self, VaultState};
use crate::writer::VaultFile;
use emma_crypto::{derive_key, KdfParams, Salt};
use emma_format::{container_salt, decode_with_key, encode, import_legacy};
use emma_storage::{SnapshotStore, StateStore};
use emma_store::{Mutation, MutationOutcome, RecordStore};
use emma_types::ResumeToken;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of the machine for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultStatus {
    pub state: VaultState,
    pub file_name: Option<String>,
    pub memory_count: u64,
    pub people_count: u64,
}

/// The vault state machine. See the module docs for the save model.
pub struct VaultStateMachine {
    pub(crate) file: Arc<dyn VaultFile>,
    pub(crate) durable: Arc<dyn StateStore>,
    pub(crate) backup: BackupStore,
    pub(crate) session: Arc<SessionCache>,
    pub(crate) kdf: KdfParams,

    pub(crate) state: VaultState,
    pub(crate) file_name: Option<String>,
    pub(crate) resume_token: Option<ResumeToken>,
    pub(crate) records: Option<RecordStore>,
    pub(crate) salt: Option<Salt>,
    /// Copy of the store as of the last successful write; the rollback
    /// target when a flush fails.
    pub(crate) last_saved: Option<RecordStore>,
    pub(crate) dirty: bool,
}

impl VaultStateMachine {
    /// Builds a machine over its collaborators, loading whatever state
    /// the durable store remembers from the previous process.
    ///
    /// A machine that loads as `Unlocked` has no record store yet; the
    /// recovery coordinator must run before any mutation is accepted.
    pub fn new(
        file: Arc<dyn VaultFile>,
        durable: Arc<dyn StateStore>,
        snapshots: Arc<dyn SnapshotStore>,
        session: Arc<SessionCache>,
        kdf: KdfParams,
    ) -> VaultResult<Self> {
        let persisted = state::load(durable.as_ref())?;
        Ok(Self {
            file,
            durable,
            backup: BackupStore::new(snapshots),
            session,
            kdf,
            state: persisted.state,
            file_name: persisted.file_name,
            resume_token: persisted.resume_token,
            records: None,
            salt: None,
            last_saved: None,
            dirty: false,
        })
    }

    /// Current lock state.
    pub fn state(&self) -> VaultState {
        self.state
    }

    /// True when unlocked with a loaded record store.
    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked && self.records.is_some()
    }

    /// Whether mutations are pending a flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Status for UI surfaces. Counts are zero while locked.
    pub fn status(&self) -> VaultStatus {
        let stats = self.records.as_ref().map(|r| r.stats()).unwrap_or_default();
        VaultStatus {
            state: self.state,
            file_name: self.file_name.clone(),
            memory_count: stats.memory_count,
            people_count: stats.people_count,
        }
    }

    /// Read access to the unlocked record store.
    pub fn records(&self) -> VaultResult<&RecordStore> {
        self.records.as_ref().ok_or(VaultError::Locked)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Creates a fresh vault: new salt, empty store, initial atomic
    /// write, durable unlocked state, session cache, backup snapshot.
    pub fn create(&mut self, name: &str, passphrase: &str) -> VaultResult<()> {
        if self.state == VaultState::Unlocked {
            return Err(VaultError::AlreadyUnlocked);
        }

        let salt = Salt::random();
        let key = derive_key(passphrase, &salt, &self.kdf);
        let records = RecordStore::new();

        let bytes = encode(&records, &salt, &key).map_err(VaultError::from_format)?;
        self.file.write(&bytes)?;

        self.session.store(passphrase, key.clone());
        let token = self.backup.snapshot(name, &records, &salt, &key)?;
        state::save_unlocked(self.durable.as_ref(), name, token)?;

        self.state = VaultState::Unlocked;
        self.file_name = Some(name.to_string());
        self.resume_token = Some(token);
        self.last_saved = Some(records.clone());
        self.records = Some(records);
        self.salt = Some(salt);
        self.dirty = false;

        info!(vault = name, "created vault");
        Ok(())
    }

    /// Unlocks from the capability's current file content.
    pub fn unlock(&mut self, passphrase: &str) -> VaultResult<()> {
        if self.state == VaultState::Unlocked {
            return Err(VaultError::AlreadyUnlocked);
        }
        let bytes = self.file.read()?;
        self.unlock_with_bytes(&bytes, passphrase)
    }

    /// Unlocks from caller-supplied file bytes.
    ///
    /// Any decode or authentication failure leaves the machine locked
    /// with no partial effect.
    pub fn unlock_with_bytes(&mut self, bytes: &[u8], passphrase: &str) -> VaultResult<()> {
        if self.state == VaultState::Unlocked {
            return Err(VaultError::AlreadyUnlocked);
        }

        let salt = container_salt(bytes).map_err(VaultError::from_format)?;
        let key = derive_key(passphrase, &salt, &self.kdf);
        let records = decode_with_key(bytes, &key).map_err(VaultError::from_format)?;

        let name = self.file.name();
        self.session.store(passphrase, key.clone());
        let token = self.backup.snapshot(&name, &records, &salt, &key)?;
        state::save_unlocked(self.durable.as_ref(), &name, token)?;

        self.state = VaultState::Unlocked;
        self.file_name = Some(name);
        self.resume_token = Some(token);
        self.last_saved = Some(records.clone());
        self.records = Some(records);
        self.salt = Some(salt);
        self.dirty = false;

        info!(vault = self.file_name.as_deref().unwrap_or_default(), "unlocked vault");
        Ok(())
    }

    /// Imports an unencrypted legacy vault and immediately re-encrypts
    /// it into the current container format.
    ///
    /// This is the only path that accepts legacy plaintext; `unlock`
    /// refuses such files.
    pub fn import_legacy_vault(&mut self, passphrase: &str) -> VaultResult<()> {
        if self.state == VaultState::Unlocked {
            return Err(VaultError::AlreadyUnlocked);
        }

        let bytes = self.file.read()?;
        let records = import_legacy(&bytes).map_err(VaultError::from_format)?;

        let salt = Salt::random();
        let key = derive_key(passphrase, &salt, &self.kdf);
        let encoded = encode(&records, &salt, &key).map_err(VaultError::from_format)?;
        self.file.write(&encoded)?;

        let name = self.file.name();
        self.session.store(passphrase, key.clone());
        let token = self.backup.snapshot(&name, &records, &salt, &key)?;
        state::save_unlocked(self.durable.as_ref(), &name, token)?;

        self.state = VaultState::Unlocked;
        self.file_name = Some(name);
        self.resume_token = Some(token);
        self.last_saved = Some(records.clone());
        self.records = Some(records);
        self.salt = Some(salt);
        self.dirty = false;

        info!("imported legacy vault and re-encrypted it");
        Ok(())
    }

    /// Locks the vault: flushes pending mutations, zeroizes and drops
    /// the record store, clears the session cache and backup slot, and
    /// persists the locked state.
    ///
    /// Locking an already-locked vault is a no-op. If the final flush
    /// fails the vault stays unlocked and the error surfaces — dropping
    /// plaintext that never reached the file would lose data.
    pub fn lock(&mut self) -> VaultResult<()> {
        if self.state == VaultState::Locked {
            return Ok(());
        }
        if self.dirty {
            self.flush()?;
        }

        if let Some(mut records) = self.records.take() {
            records.zeroize_contents();
        }
        self.last_saved = None;
        self.salt = None;
        self.session.clear();
        self.backup.clear()?;
        state::save_locked(self.durable.as_ref())?;
        self.resume_token = None;
        self.state = VaultState::Locked;

        info!("locked vault");
        Ok(())
    }

    // ── Mutation + persistence ───────────────────────────────────

    /// Applies a mutation to the unlocked store and marks it dirty.
    ///
    /// Rejects with `Locked` while locked. The mutation either fully
    /// applies or fully rejects; persistence happens at the next
    /// `flush`.
    pub fn mutate(&mut self, op: Mutation) -> VaultResult<MutationOutcome> {
        if self.state != VaultState::Unlocked {
            return Err(VaultError::Locked);
        }
        let records = self.records.as_mut().ok_or(VaultError::Locked)?;

        let outcome = op.apply(records)?;
        self.dirty = true;
        Ok(outcome)
    }

    /// Persists the latest in-memory state in one atomic write and
    /// refreshes the backup snapshot and resume token.
    ///
    /// No-op when nothing is dirty. On a write failure the in-memory
    /// store rolls back to the last persisted state and the error is
    /// returned to the caller.
    pub fn flush(&mut self) -> VaultResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let records = self.records.as_ref().ok_or(VaultError::Locked)?;
        let salt = self.salt.as_ref().ok_or(VaultError::Locked)?;
        let key = self.session.key().ok_or(VaultError::Locked)?;

        let bytes = encode(records, salt, &key).map_err(VaultError::from_format)?;
        if let Err(write_err) = self.file.write(&bytes) {
            warn!(error = %write_err, "flush failed; rolling back in-memory mutations");
            if let Some(saved) = &self.last_saved {
                self.records = Some(saved.clone());
            }
            self.dirty = false;
            return Err(write_err.into());
        }

        self.last_saved = self.records.clone();
        self.dirty = false;

        let name = self.file_name.clone().unwrap_or_else(|| self.file.name());
        let records = self.records.as_ref().ok_or(VaultError::Locked)?;
        let token = self.backup.snapshot(&name, records, salt, &key)?;
        state::save_resume_token(self.durable.as_ref(), token)?;
        self.resume_token = Some(token);

        debug!(len = bytes.len(), "flushed vault");
        Ok(())
    }

    /// Explicit recovery from the backup snapshot with a caller-supplied
    /// passphrase.
    ///
    /// Serves the case where the automatic startup pass already forced a
    /// lock because the volatile cache was empty, but a foreground
    /// context still holds the passphrase. The restored store is marked
    /// dirty so the next flush re-establishes the file content.
    pub fn recover_from_backup(&mut self, passphrase: &str) -> VaultResult<()> {
        if self.state == VaultState::Unlocked {
            return Err(VaultError::AlreadyUnlocked);
        }

        let restored = self
            .backup
            .restore(passphrase, &self.kdf)?
            .ok_or(VaultError::NoSnapshot)?;

        self.session.store(passphrase, restored.key);
        state::save_unlocked(self.durable.as_ref(), &restored.vault_name, restored.token)?;

        self.state = VaultState::Unlocked;
        self.file_name = Some(restored.vault_name);
        self.resume_token = Some(restored.token);
        self.last_saved = Some(restored.records.clone());
        self.records = Some(restored.records);
        self.salt = Some(restored.salt);
        self.dirty = true;

        info!("recovered record store from backup snapshot");
        Ok(())
    }

    /// Re-salts and re-encrypts the whole vault under a new passphrase.
    ///
    /// The old passphrase must verify against the current session key.
    /// Nothing changes unless the re-encrypted container reaches disk.
    pub fn change_passphrase(&mut self, old: &str, new: &str) -> VaultResult<()> {
        if self.state != VaultState::Unlocked {
            return Err(VaultError::Locked);
        }
        let records = self.records.as_ref().ok_or(VaultError::Locked)?;
        let salt = self.salt.as_ref().ok_or(VaultError::Locked)?;
        let current_key = self.session.key().ok_or(VaultError::Locked)?;

        if derive_key(old, salt, &self.kdf) != current_key {
            return Err(VaultError::Authentication);
        }

        let new_salt = Salt::random();
        let new_key = derive_key(new, &new_salt, &self.kdf);
        let bytes = encode(records, &new_salt, &new_key).map_err(VaultError::from_format)?;
        self.file.write(&bytes)?;

        let name = self.file_name.clone().unwrap_or_else(|| self.file.name());
        self.session.store(new, new_key.clone());
        let token = self.backup.snapshot(&name, records, &new_salt, &new_key)?;
        state::save_resume_token(self.durable.as_ref(), token)?;
        self.resume_token = Some(token);
        self.salt = Some(new_salt);
        self.last_saved = self.records.clone();
        self.dirty = false;

        info!("changed vault passphrase");
        Ok(())
    }
}

impl std::fmt::Debug for VaultStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStateMachine")
            .field("state", &self.state)
            .field("file_name", &self.file_name)
            .field("dirty", &self.dirty)
            .finish()
    }
}
