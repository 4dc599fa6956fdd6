//! SQLite storage layer for the Emma vault.
//!
//! Two durable collaborators live here, both behind traits so the vault
//! layer never touches SQL directly and tests can run against in-memory
//! doubles:
//!
//! - [`StateStore`]: string key/value storage for the durable vault
//!   state (`vaultState`, `vaultFileName`, `resumeToken`). Read at
//!   process start before any decryption occurs.
//! - [`SnapshotStore`]: append-only storage for encrypted backup
//!   snapshots under a single fixed slot. Only ciphertext ever reaches
//!   this layer; the passphrase and derived key never do.

mod error;
mod snapshot_store;
mod state_store;

pub use error::{StorageError, StorageResult};
pub use snapshot_store::{
    EncryptedSnapshot, MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore, SNAPSHOT_SLOT,
};
pub use state_store::{MemoryStateStore, SqliteStateStore, StateStore};

use std::path::Path;
use std::time::Duration;

/// Opens a SQLite database with WAL journaling and a busy timeout.
///
/// WAL keeps the single-writer-many-reader case cheap; the busy timeout
/// covers the moment where a freshly restarted process races a dying one
/// over the same database file.
pub fn open_database(path: &Path) -> StorageResult<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    tracing::debug!(path = %path.display(), "opened vault state database");
    Ok(conn)
}
