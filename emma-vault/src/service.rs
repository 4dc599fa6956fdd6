//! Cross-context request/response layer.
//!
//! Exactly one context holds the file capability and the unlocked
//! record store. Every other context sends typed requests over a
//! channel and never assumes it can write directly. The service task
//! owns the [`VaultStateMachine`] and handles requests strictly in
//! arrival order, which is what serializes all mutation traffic.
//!
//! Requests that receive no response within the configured timeout
//! resolve as [`VaultError::Timeout`] without mutating caller-side
//! state; the operation may still complete on the service side.

use crate::error::{VaultError, VaultResult};
use crate::machine::{VaultStateMachine, VaultStatus};
use crate::recovery::{RecoveryCoordinator, RecoveryOutcome};
use emma_store::{Mutation, MutationOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Tunables for the service layer.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a client waits for a response before giving up.
    pub request_timeout: Duration,
    /// Request queue depth before senders start waiting.
    pub queue_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            queue_depth: 32,
        }
    }
}

/// A typed request against the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VaultRequest {
    /// Create a fresh vault under the given name.
    Create { name: String, passphrase: String },
    /// Unlock from the capability's current file content.
    Unlock { passphrase: String },
    /// Flush and lock.
    Lock,
    /// Lock state, file name, and record counts.
    GetStatus,
    /// Apply one mutation to the unlocked store.
    Mutate(Mutation),
    /// Persist pending mutations now.
    Flush,
    /// Re-run startup recovery, optionally seeding the session cache
    /// with a passphrase supplied by the caller.
    Recover { passphrase: Option<String> },
    /// Import an unencrypted legacy vault, re-encrypting it in place.
    ImportLegacy { passphrase: String },
    /// Re-salt and re-encrypt under a new passphrase.
    ChangePassphrase { old: String, new: String },
}

/// A successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VaultResponse {
    /// The operation completed.
    Ack,
    /// Status payload.
    Status(VaultStatus),
    /// Mutation outcome with any generated id.
    Mutated(MutationOutcome),
    /// What recovery did.
    Recovery(RecoveryOutcome),
}

struct Envelope {
    request: VaultRequest,
    reply: oneshot::Sender<VaultResult<VaultResponse>>,
}

/// The task owning the state machine and serving requests.
pub struct VaultService {
    machine: VaultStateMachine,
    rx: mpsc::Receiver<Envelope>,
}

impl VaultService {
    /// Spawns the service on the current runtime and returns a client.
    ///
    /// Startup recovery runs before the first request is accepted, so
    /// no mutation can observe `Unlocked`-with-empty-store.
    pub fn spawn(machine: VaultStateMachine, config: ServiceConfig) -> VaultClient {
        let (tx, rx) = mpsc::channel(config.queue_depth);
        let service = VaultService { machine, rx };
        tokio::spawn(service.run());
        VaultClient {
            tx,
            timeout: config.request_timeout,
        }
    }

    async fn run(mut self) {
        let outcome = RecoveryCoordinator::run(&mut self.machine);
        if outcome != RecoveryOutcome::NotNeeded {
            info!(?outcome, "startup recovery finished");
        }

        while let Some(envelope) = self.rx.recv().await {
            let response = self.handle(envelope.request);
            // A dropped receiver means the caller timed out; the work is
            // already done either way.
            let _ = envelope.reply.send(response);
        }
        debug!("vault service shutting down");
    }

    fn handle(&mut self, request: VaultRequest) -> VaultResult<VaultResponse> {
        match request {
            VaultRequest::Create { name, passphrase } => {
                self.machine.create(&name, &passphrase)?;
                Ok(VaultResponse::Ack)
            }
            VaultRequest::Unlock { passphrase } => {
                self.machine.unlock(&passphrase)?;
                Ok(VaultResponse::Ack)
            }
            VaultRequest::Lock => {
                self.machine.lock()?;
                Ok(VaultResponse::Ack)
            }
            VaultRequest::GetStatus => Ok(VaultResponse::Status(self.machine.status())),
            VaultRequest::Mutate(op) => {
                let outcome = self.machine.mutate(op)?;
                Ok(VaultResponse::Mutated(outcome))
            }
            VaultRequest::Flush => {
                self.machine.flush()?;
                Ok(VaultResponse::Ack)
            }
            VaultRequest::Recover { passphrase } => {
                use crate::state::VaultState;

                let pending = self.machine.state() == VaultState::Unlocked
                    && !self.machine.is_unlocked();
                match passphrase {
                    Some(passphrase) if pending => {
                        // Seed the cache and let the coordinator do its
                        // usual pass; the key is re-derived from the
                        // snapshot salt during the restore.
                        self.machine.session.store_passphrase(&passphrase);
                        let outcome = RecoveryCoordinator::run(&mut self.machine);
                        Ok(VaultResponse::Recovery(outcome))
                    }
                    Some(passphrase) if self.machine.state() == VaultState::Locked => {
                        // Startup recovery already forced a lock, but
                        // this caller still knows the passphrase.
                        self.machine.recover_from_backup(&passphrase)?;
                        Ok(VaultResponse::Recovery(RecoveryOutcome::Restored))
                    }
                    _ => {
                        let outcome = RecoveryCoordinator::run(&mut self.machine);
                        Ok(VaultResponse::Recovery(outcome))
                    }
                }
            }
            VaultRequest::ImportLegacy { passphrase } => {
                self.machine.import_legacy_vault(&passphrase)?;
                Ok(VaultResponse::Ack)
            }
            VaultRequest::ChangePassphrase { old, new } => {
                self.machine.change_passphrase(&old, &new)?;
                Ok(VaultResponse::Ack)
            }
        }
    }
}

/// Handle for sending requests to the service from any context.
#[derive(Clone)]
pub struct VaultClient {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl VaultClient {
    /// Sends a raw request and awaits its response.
    pub async fn request(&self, request: VaultRequest) -> VaultResult<VaultResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| VaultError::ServiceUnavailable)?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => Err(VaultError::ServiceUnavailable),
            Err(_) => Err(VaultError::Timeout),
        }
    }

    /// Creates a fresh vault.
    pub async fn create(&self, name: &str, passphrase: &str) -> VaultResult<()> {
        self.request(VaultRequest::Create {
            name: name.to_string(),
            passphrase: passphrase.to_string(),
        })
        .await
        .map(|_| ())
    }

    /// Unlocks the vault.
    pub async fn unlock(&self, passphrase: &str) -> VaultResult<()> {
        self.request(VaultRequest::Unlock {
            passphrase: passphrase.to_string(),
        })
        .await
        .map(|_| ())
    }

    /// Flushes and locks the vault.
    pub async fn lock(&self) -> VaultResult<()> {
        self.request(VaultRequest::Lock).await.map(|_| ())
    }

    /// Fetches the current status.
    pub async fn status(&self) -> VaultResult<VaultStatus> {
        match self.request(VaultRequest::GetStatus).await? {
            VaultResponse::Status(status) => Ok(status),
            _ => Err(VaultError::ServiceUnavailable),
        }
    }

    /// Applies one mutation.
    pub async fn mutate(&self, op: Mutation) -> VaultResult<MutationOutcome> {
        match self.request(VaultRequest::Mutate(op)).await? {
            VaultResponse::Mutated(outcome) => Ok(outcome),
            _ => Err(VaultError::ServiceUnavailable),
        }
    }

    /// Persists pending mutations now.
    pub async fn flush(&self) -> VaultResult<()> {
        self.request(VaultRequest::Flush).await.map(|_| ())
    }

    /// Re-runs recovery, optionally supplying a passphrase.
    pub async fn recover(&self, passphrase: Option<&str>) -> VaultResult<RecoveryOutcome> {
        let request = VaultRequest::Recover {
            passphrase: passphrase.map(str::to_string),
        };
        match self.request(request).await? {
            VaultResponse::Recovery(outcome) => Ok(outcome),
            _ => Err(VaultError::ServiceUnavailable),
        }
    }
}
