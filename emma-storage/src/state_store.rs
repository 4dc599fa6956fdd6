//! Durable key/value storage for vault state.

use crate::error::{StorageError, StorageResult};
use crate::open_database;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// String key/value storage that survives process restarts.
///
/// Holds only non-secret metadata (`vaultState`, `vaultFileName`,
/// `resumeToken`). The passphrase never goes through this trait.
pub trait StateStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes a value. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Opens (or creates) the state store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_conn(Arc::new(Mutex::new(open_database(path)?)))
    }

    /// Opens an in-memory state store.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_conn(Arc::new(Mutex::new(Connection::open_in_memory()?)))
    }

    /// Builds a state store over an existing connection, creating the
    /// table on first use.
    pub fn with_conn(conn: Arc<Mutex<Connection>>) -> StorageResult<Self> {
        let store = Self { conn };
        store.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS durable_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(store)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::InvalidData("state store lock poisoned".to_string()))
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM durable_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn()?.execute(
            "INSERT INTO durable_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.conn()?
            .execute("DELETE FROM durable_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// In-memory state store for tests and contexts without disk access.
#[derive(Default)]
pub struct MemoryStateStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> StorageResult<MutexGuard<'_, HashMap<String, String>>> {
        self.map
            .lock()
            .map_err(|_| StorageError::InvalidData("state store lock poisoned".to_string()))
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.map()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.map()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.map()?.remove(key);
        Ok(())
    }
}
