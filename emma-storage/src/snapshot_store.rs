//! Append-only storage for encrypted backup snapshots.

use crate::error::{StorageError, StorageResult};
use crate::open_database;
use emma_crypto::{EncryptedData, Salt, NONCE_SIZE, SALT_SIZE};
use emma_types::{ResumeToken, Timestamp};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// The single slot the vault writes its latest snapshot under.
pub const SNAPSHOT_SLOT: &str = "latest";

/// One encrypted snapshot of the record store.
///
/// Independent of the vault file: it exists so that losing the file
/// capability (but not the passphrase) does not lose unsaved state.
/// Shares the vault's salt so the cached passphrase re-derives the same
/// key during recovery.
#[derive(Debug, Clone)]
pub struct EncryptedSnapshot {
    /// Name of the vault this snapshot belongs to.
    pub vault_name: String,
    /// The vault's key-derivation salt.
    pub salt: Salt,
    /// Nonce + ciphertext of the serialized record store.
    pub data: EncryptedData,
    /// When the snapshot was taken.
    pub created_at: Timestamp,
    /// Token tying this snapshot to the durable unlocked state.
    pub token: ResumeToken,
}

/// Append-only snapshot storage under a fixed slot.
pub trait SnapshotStore: Send + Sync {
    /// Appends a snapshot to the slot.
    fn append(&self, snapshot: &EncryptedSnapshot) -> StorageResult<()>;

    /// Returns the newest snapshot in the slot, if any.
    fn latest(&self) -> StorageResult<Option<EncryptedSnapshot>>;

    /// Removes every snapshot in the slot.
    fn clear(&self) -> StorageResult<()>;
}

/// SQLite-backed snapshot store.
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Opens (or creates) the snapshot store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_conn(Arc::new(Mutex::new(open_database(path)?)))
    }

    /// Opens an in-memory snapshot store.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_conn(Arc::new(Mutex::new(Connection::open_in_memory()?)))
    }

    /// Builds a snapshot store over an existing connection, creating
    /// the table on first use. Rows are only ever inserted or deleted
    /// by slot, never updated.
    pub fn with_conn(conn: Arc<Mutex<Connection>>) -> StorageResult<Self> {
        let store = Self { conn };
        store.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                slot       TEXT NOT NULL,
                vault_name TEXT NOT NULL,
                token      TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                salt       BLOB NOT NULL,
                nonce      BLOB NOT NULL,
                ciphertext BLOB NOT NULL
            )",
            [],
        )?;
        Ok(store)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::InvalidData("snapshot store lock poisoned".to_string()))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn append(&self, snapshot: &EncryptedSnapshot) -> StorageResult<()> {
        self.conn()?.execute(
            "INSERT INTO snapshots (slot, vault_name, token, created_at, salt, nonce, ciphertext)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                SNAPSHOT_SLOT,
                snapshot.vault_name,
                snapshot.token.to_string(),
                snapshot.created_at.as_millis(),
                snapshot.salt.as_bytes().as_slice(),
                snapshot.data.nonce.as_slice(),
                snapshot.data.ciphertext,
            ],
        )?;
        tracing::debug!(vault = %snapshot.vault_name, token = %snapshot.token, "appended backup snapshot");
        Ok(())
    }

    fn latest(&self) -> StorageResult<Option<EncryptedSnapshot>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT vault_name, token, created_at, salt, nonce, ciphertext
                 FROM snapshots WHERE slot = ?1
                 ORDER BY seq DESC LIMIT 1",
                params![SNAPSHOT_SLOT],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((vault_name, token, created_at, salt, nonce, ciphertext)) = row else {
            return Ok(None);
        };

        let salt: [u8; SALT_SIZE] = salt
            .try_into()
            .map_err(|_| StorageError::InvalidData("snapshot salt has wrong length".to_string()))?;
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| StorageError::InvalidData("snapshot nonce has wrong length".to_string()))?;
        let token = ResumeToken::parse(&token)
            .map_err(|e| StorageError::InvalidData(format!("snapshot token: {e}")))?;

        Ok(Some(EncryptedSnapshot {
            vault_name,
            salt: Salt::from_bytes(salt),
            data: EncryptedData { nonce, ciphertext },
            created_at: Timestamp::from_millis(created_at),
            token,
        }))
    }

    fn clear(&self) -> StorageResult<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM snapshots WHERE slot = ?1", params![SNAPSHOT_SLOT])?;
        tracing::debug!(deleted, "cleared backup snapshots");
        Ok(())
    }
}

/// In-memory snapshot store for tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<Vec<EncryptedSnapshot>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> StorageResult<MutexGuard<'_, Vec<EncryptedSnapshot>>> {
        self.rows
            .lock()
            .map_err(|_| StorageError::InvalidData("snapshot store lock poisoned".to_string()))
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn append(&self, snapshot: &EncryptedSnapshot) -> StorageResult<()> {
        self.rows()?.push(snapshot.clone());
        Ok(())
    }

    fn latest(&self) -> StorageResult<Option<EncryptedSnapshot>> {
        Ok(self.rows()?.last().cloned())
    }

    fn clear(&self) -> StorageResult<()> {
        self.rows()?.clear();
        Ok(())
    }
}
