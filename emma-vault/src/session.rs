//! Volatile, process-lifetime session cache.
//!
//! Holds the passphrase and derived key of the currently unlocked vault
//! so recovery can rehydrate from a backup snapshot after the machine is
//! torn down within the same process. Never serialized; cleared and
//! zeroized on lock.

use emma_crypto::DerivedKey;
use std::sync::Mutex;
use zeroize::Zeroizing;

struct SessionSecrets {
    passphrase: Zeroizing<String>,
    /// Absent when only a passphrase was seeded (pre-recovery); the
    /// coordinator re-derives the key from the snapshot salt.
    key: Option<DerivedKey>,
}

/// Shared volatile cache of the unlocked session's secrets.
///
/// One instance per process, shared between the state machine and the
/// recovery coordinator via `Arc`.
#[derive(Default)]
pub struct SessionCache {
    inner: Mutex<Option<SessionSecrets>>,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session secrets, replacing (and zeroizing) any
    /// previous ones.
    pub fn store(&self, passphrase: &str, key: DerivedKey) {
        let mut guard = self.lock();
        *guard = Some(SessionSecrets {
            passphrase: Zeroizing::new(passphrase.to_string()),
            key: Some(key),
        });
    }

    /// Seeds only a passphrase (e.g., from an explicit recovery
    /// request); the key follows once something derives it.
    pub fn store_passphrase(&self, passphrase: &str) {
        let mut guard = self.lock();
        *guard = Some(SessionSecrets {
            passphrase: Zeroizing::new(passphrase.to_string()),
            key: None,
        });
    }

    /// Returns the cached passphrase, if any.
    pub fn passphrase(&self) -> Option<Zeroizing<String>> {
        self.lock().as_ref().map(|s| s.passphrase.clone())
    }

    /// Returns the cached derived key, if any.
    pub fn key(&self) -> Option<DerivedKey> {
        self.lock().as_ref().and_then(|s| s.key.clone())
    }

    /// True when secrets are cached.
    pub fn is_populated(&self) -> bool {
        self.lock().is_some()
    }

    /// Drops the secrets. `Zeroizing` and `DerivedKey` overwrite their
    /// buffers as they go.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionSecrets>> {
        // Secrets never cross a panic boundary mid-update; a poisoned
        // lock still holds a coherent Option.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("populated", &self.is_populated())
            .finish()
    }
}
