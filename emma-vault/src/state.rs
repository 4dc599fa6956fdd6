//! The authoritative vault state and its durable persistence.

use crate::error::VaultResult;
use emma_storage::StateStore;
use emma_types::ResumeToken;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable state keys, read at process start before any decryption.
const KEY_STATE: &str = "vaultState";
const KEY_FILE_NAME: &str = "vaultFileName";
const KEY_RESUME_TOKEN: &str = "resumeToken";

/// The lock state of the vault. The only transitions are
/// `Locked -> Unlocked -> Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultState {
    Locked,
    Unlocked,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultState::Locked => write!(f, "locked"),
            VaultState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// What the durable store remembers across process restarts.
#[derive(Debug, Clone)]
pub(crate) struct PersistedState {
    pub state: VaultState,
    pub file_name: Option<String>,
    pub resume_token: Option<ResumeToken>,
}

/// Loads the persisted state, defaulting to locked.
///
/// An unparseable token is treated as absent rather than an error:
/// recovery will force a lock anyway, and failing to even construct the
/// machine would leave no way out.
pub(crate) fn load(store: &dyn StateStore) -> VaultResult<PersistedState> {
    let state = match store.get(KEY_STATE)?.as_deref() {
        Some("unlocked") => VaultState::Unlocked,
        _ => VaultState::Locked,
    };
    let file_name = store.get(KEY_FILE_NAME)?;
    let resume_token = store
        .get(KEY_RESUME_TOKEN)?
        .and_then(|raw| ResumeToken::parse(&raw).ok());

    Ok(PersistedState {
        state,
        file_name,
        resume_token,
    })
}

/// Persists the unlocked state with its file name and resume token.
pub(crate) fn save_unlocked(
    store: &dyn StateStore,
    file_name: &str,
    token: ResumeToken,
) -> VaultResult<()> {
    store.put(KEY_STATE, "unlocked")?;
    store.put(KEY_FILE_NAME, file_name)?;
    store.put(KEY_RESUME_TOKEN, &token.to_string())?;
    Ok(())
}

/// Persists the locked state and clears the resume token. The file name
/// is kept so the UI can offer the last vault for re-unlocking.
pub(crate) fn save_locked(store: &dyn StateStore) -> VaultResult<()> {
    store.put(KEY_STATE, "locked")?;
    store.delete(KEY_RESUME_TOKEN)?;
    Ok(())
}

/// Refreshes only the resume token (after a flush snapshot).
pub(crate) fn save_resume_token(store: &dyn StateStore, token: ResumeToken) -> VaultResult<()> {
    store.put(KEY_RESUME_TOKEN, &token.to_string())?;
    Ok(())
}
