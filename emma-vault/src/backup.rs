//! Encrypted backup snapshots of the live record store.
//!
//! One snapshot of the current store is kept in the append-only
//! snapshot slot, used only for recovery: losing the file capability
//! (but not the passphrase) must not lose unsaved state. Snapshots share
//! the vault's salt and key, so the cached passphrase re-derives the
//! same key when rehydrating.

use crate::error::{VaultError, VaultResult};
use emma_crypto::{decrypt, derive_key, encrypt, DerivedKey, KdfParams, Salt};
use emma_storage::{EncryptedSnapshot, SnapshotStore};
use emma_store::RecordStore;
use emma_types::{ResumeToken, Timestamp};
use std::sync::Arc;

/// Wraps the snapshot slot with encrypt-on-write, decrypt-on-read.
pub struct BackupStore {
    snapshots: Arc<dyn SnapshotStore>,
}

/// A snapshot decrypted during recovery.
pub struct RestoredSnapshot {
    pub records: RecordStore,
    pub salt: Salt,
    pub key: DerivedKey,
    pub token: ResumeToken,
    pub vault_name: String,
}

impl BackupStore {
    /// Creates a backup store over a snapshot slot.
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { snapshots }
    }

    /// Encrypts the current record store and appends it to the slot.
    /// Returns the freshly minted resume token identifying the snapshot.
    pub fn snapshot(
        &self,
        vault_name: &str,
        records: &RecordStore,
        salt: &Salt,
        key: &DerivedKey,
    ) -> VaultResult<ResumeToken> {
        let payload = serde_json::to_vec(records)?;
        let data = encrypt(key, &payload).map_err(|e| VaultError::Crypto(e.to_string()))?;

        let token = ResumeToken::new();
        self.snapshots.append(&EncryptedSnapshot {
            vault_name: vault_name.to_string(),
            salt: salt.clone(),
            data,
            created_at: Timestamp::now(),
            token,
        })?;
        Ok(token)
    }

    /// Decrypts the latest snapshot with a passphrase.
    ///
    /// Returns `Ok(None)` when the slot is empty. A snapshot that fails
    /// to decrypt surfaces as `Authentication`; recovery treats that as
    /// an expected failure and falls back to a forced lock.
    pub fn restore(
        &self,
        passphrase: &str,
        params: &KdfParams,
    ) -> VaultResult<Option<RestoredSnapshot>> {
        let Some(snapshot) = self.snapshots.latest()? else {
            return Ok(None);
        };

        let key = derive_key(passphrase, &snapshot.salt, params);
        let plaintext =
            decrypt(&key, &snapshot.data).map_err(|_| VaultError::Authentication)?;
        let records: RecordStore = serde_json::from_slice(&plaintext)?;

        Ok(Some(RestoredSnapshot {
            records,
            salt: snapshot.salt,
            key,
            token: snapshot.token,
            vault_name: snapshot.vault_name,
        }))
    }

    /// Empties the snapshot slot.
    pub fn clear(&self) -> VaultResult<()> {
        self.snapshots.clear()?;
        Ok(())
    }
}
