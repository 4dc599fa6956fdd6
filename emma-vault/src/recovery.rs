//! Startup recovery of an interrupted unlocked session.
//!
//! Runs once at process start, before any mutation is accepted. The one
//! tolerated inconsistency in the system is durable state saying
//! `Unlocked` while no record store is loaded — and only for the
//! duration of this single attempt. Failure here is expected, not an
//! error: the in-memory cache is recoverable by unlocking again, so the
//! coordinator self-heals to `Locked` instead of propagating.

use crate::machine::VaultStateMachine;
use crate::state::{self, VaultState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the coordinator did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    /// State was consistent; nothing to do.
    NotNeeded,
    /// The record store was rehydrated from the backup snapshot; the
    /// vault stays unlocked.
    Restored,
    /// No cached passphrase, no matching snapshot, or decryption
    /// failed; durable state was forced back to locked.
    ForcedLock,
}

/// Coordinates the one-shot startup recovery pass.
pub struct RecoveryCoordinator;

impl RecoveryCoordinator {
    /// Attempts to rehydrate `Unlocked`-with-empty-store from the
    /// backup snapshot; otherwise forces the machine to `Locked`.
    pub fn run(machine: &mut VaultStateMachine) -> RecoveryOutcome {
        if machine.state != VaultState::Unlocked || machine.records.is_some() {
            return RecoveryOutcome::NotNeeded;
        }

        let Some(passphrase) = machine.session.passphrase() else {
            info!("unlocked state with no cached passphrase; forcing lock");
            return Self::force_lock(machine);
        };

        match machine.backup.restore(&passphrase, &machine.kdf) {
            Ok(Some(restored)) => {
                // A snapshot from some other session is no better than
                // no snapshot; the resume token must match.
                if machine.resume_token != Some(restored.token) {
                    warn!(
                        snapshot = %restored.token,
                        "backup snapshot does not match resume token; forcing lock"
                    );
                    return Self::force_lock(machine);
                }

                machine.session.store(&passphrase, restored.key);
                machine.file_name = Some(restored.vault_name);
                machine.last_saved = Some(restored.records.clone());
                machine.records = Some(restored.records);
                machine.salt = Some(restored.salt);
                machine.dirty = false;

                info!("restored record store from backup snapshot");
                RecoveryOutcome::Restored
            }
            Ok(None) => {
                info!("no backup snapshot to restore; forcing lock");
                Self::force_lock(machine)
            }
            Err(e) => {
                warn!(error = %e, "backup restore failed; forcing lock");
                Self::force_lock(machine)
            }
        }
    }

    fn force_lock(machine: &mut VaultStateMachine) -> RecoveryOutcome {
        machine.session.clear();
        machine.records = None;
        machine.last_saved = None;
        machine.salt = None;
        machine.resume_token = None;
        machine.state = VaultState::Locked;
        machine.dirty = false;

        // Best-effort: if even the durable store is failing there is
        // nothing more to do, and the in-memory state is already locked.
        if let Err(e) = state::save_locked(machine.durable.as_ref()) {
            warn!(error = %e, "could not persist forced lock");
        }
        RecoveryOutcome::ForcedLock
    }
}
