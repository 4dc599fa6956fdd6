//! The vault file capability and its atomic writer.
//!
//! The file is a single mutable artifact shared across process restarts;
//! a torn write would destroy the only full copy of the vault. Writes
//! therefore go to a temp file in the target's directory, are synced,
//! and then renamed over the target, so the file is observed either
//! fully-old or fully-new.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the vault file capability.
///
/// `PermissionDenied` and `NotFound` are distinct on purpose: the first
/// means "re-grant access", the second "the file moved or was deleted,
/// re-select it". Everything else is `Busy`.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Write permission was revoked since the capability was granted.
    #[error("permission to the vault file was denied")]
    PermissionDenied,

    /// The vault file (or its directory) is gone.
    #[error("vault file not found")]
    NotFound,

    /// Transient I/O failure.
    #[error("vault file busy: {0}")]
    Busy(String),
}

/// Capability to one vault file: read its bytes, atomically replace
/// them, and name it for status displays.
///
/// A trait so tests can inject failing writers; the single production
/// implementation is [`AtomicFileWriter`].
pub trait VaultFile: Send + Sync {
    /// Display name of the file (for durable state and status).
    fn name(&self) -> String;

    /// Reads the entire current content.
    fn read(&self) -> Result<Vec<u8>, WriteError>;

    /// Atomically replaces the entire content.
    fn write(&self, bytes: &[u8]) -> Result<(), WriteError>;
}

/// Filesystem-backed vault file capability.
pub struct AtomicFileWriter {
    path: PathBuf,
}

impl AtomicFileWriter {
    /// Wraps a capability to the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The wrapped path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Permissions can be revoked between calls, so every write starts
    /// with a fresh check against the current filesystem state.
    fn check_writable(&self) -> Result<(), WriteError> {
        let parent = self.path.parent().ok_or(WriteError::NotFound)?;
        if !parent.exists() {
            return Err(WriteError::NotFound);
        }
        match fs::metadata(&self.path) {
            Ok(meta) if meta.permissions().readonly() => Err(WriteError::PermissionDenied),
            Ok(_) => Ok(()),
            // Absent target is fine: the initial write creates it.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e)),
        }
    }
}

impl VaultFile for AtomicFileWriter {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn read(&self) -> Result<Vec<u8>, WriteError> {
        fs::read(&self.path).map_err(map_io)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), WriteError> {
        self.check_writable()?;
        let parent = self.path.parent().ok_or(WriteError::NotFound)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(map_io)?;
        temp.write_all(bytes).map_err(map_io)?;
        temp.flush().map_err(map_io)?;
        temp.as_file().sync_all().map_err(map_io)?;

        temp.persist(&self.path).map_err(|e| map_io(e.error))?;
        tracing::debug!(path = %self.path.display(), len = bytes.len(), "replaced vault file");
        Ok(())
    }
}

fn map_io(e: io::Error) -> WriteError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => WriteError::PermissionDenied,
        io::ErrorKind::NotFound => WriteError::NotFound,
        _ => WriteError::Busy(e.to_string()),
    }
}
