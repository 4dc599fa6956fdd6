use emma_crypto::KdfParams;
use emma_storage::{MemorySnapshotStore, MemoryStateStore};
use emma_store::{MemoryMetadata, Mutation, MutationOutcome, NewMedia, NewPerson};
use emma_vault::{
    AtomicFileWriter, SessionCache, VaultError, VaultFile, VaultState, VaultStateMachine,
    WriteError,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const PASSPHRASE: &str = "correct horse battery staple";

struct Fixture {
    _temp: TempDir,
    file: Arc<AtomicFileWriter>,
    durable: Arc<MemoryStateStore>,
    snapshots: Arc<MemorySnapshotStore>,
    session: Arc<SessionCache>,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        Self {
            file: Arc::new(AtomicFileWriter::new(temp.path().join("family.emma"))),
            _temp: temp,
            durable: Arc::new(MemoryStateStore::new()),
            snapshots: Arc::new(MemorySnapshotStore::new()),
            session: Arc::new(SessionCache::new()),
        }
    }

    fn machine(&self) -> VaultStateMachine {
        VaultStateMachine::new(
            self.file.clone(),
            self.durable.clone(),
            self.snapshots.clone(),
            self.session.clone(),
            KdfParams::fast_insecure(),
        )
        .unwrap()
    }
}

fn add_memory(content: &str) -> Mutation {
    Mutation::AddMemory {
        content: content.to_string(),
        metadata: MemoryMetadata {
            emotion: Some("happy".to_string()),
            ..Default::default()
        },
        attachments: vec![],
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

#[test]
fn create_unlock_lock_cycle() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();

    assert_eq!(machine.state(), VaultState::Locked);

    machine.create("Family", PASSPHRASE).unwrap();
    assert!(machine.is_unlocked());
    assert!(fixture.session.is_populated());

    machine.lock().unwrap();
    assert_eq!(machine.state(), VaultState::Locked);
    assert!(!fixture.session.is_populated());

    machine.unlock(PASSPHRASE).unwrap();
    assert!(machine.is_unlocked());
}

#[test]
fn create_while_unlocked_is_rejected() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();
    assert!(matches!(
        machine.create("Family", PASSPHRASE),
        Err(VaultError::AlreadyUnlocked)
    ));
}

#[test]
fn lock_when_locked_is_noop() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.lock().unwrap(); // should not error
}

#[test]
fn unlock_with_wrong_passphrase_stays_locked() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();
    machine.lock().unwrap();

    let result = machine.unlock("wrong-pass");
    assert!(matches!(result, Err(VaultError::Authentication)));
    assert_eq!(machine.state(), VaultState::Locked);
    assert!(!fixture.session.is_populated());
}

// End-to-end scenario: create, add a memory, lock, unlock, and the
// memory is still there.
#[test]
fn memory_survives_lock_unlock_roundtrip() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();

    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("First day of school")).unwrap();
    machine.lock().unwrap();

    machine.unlock(PASSPHRASE).unwrap();
    let records = machine.records().unwrap();
    assert_eq!(records.stats().memory_count, 1);
    let memory = records.memories().next().unwrap();
    assert_eq!(memory.content, "First day of school");
    assert_eq!(memory.metadata.emotion.as_deref(), Some("happy"));
}

#[test]
fn unlock_without_mutations_restores_equal_store() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();

    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("tea in the garden")).unwrap();
    machine.flush().unwrap();
    let before = machine.records().unwrap().clone();

    machine.lock().unwrap();
    machine.unlock(PASSPHRASE).unwrap();

    assert_eq!(*machine.records().unwrap(), before);
}

// ── Mutations and flushing ───────────────────────────────────────

#[test]
fn mutate_while_locked_is_rejected() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    let result = machine.mutate(add_memory("nope"));
    assert!(matches!(result, Err(VaultError::Locked)));
}

#[test]
fn mutations_mark_dirty_and_flush_clears_it() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();
    assert!(!machine.is_dirty());

    machine.mutate(add_memory("one")).unwrap();
    assert!(machine.is_dirty());

    machine.flush().unwrap();
    assert!(!machine.is_dirty());
}

#[test]
fn flush_coalesces_mutations_into_latest_state() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();

    machine.mutate(add_memory("one")).unwrap();
    machine.mutate(add_memory("two")).unwrap();
    machine.mutate(add_memory("three")).unwrap();
    machine.flush().unwrap();

    // The file must hold all three, not an intermediate state.
    machine.lock().unwrap();
    machine.unlock(PASSPHRASE).unwrap();
    assert_eq!(machine.records().unwrap().stats().memory_count, 3);
}

#[test]
fn lock_flushes_pending_mutations() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("unsaved")).unwrap();

    machine.lock().unwrap(); // final flush happens here

    machine.unlock(PASSPHRASE).unwrap();
    assert_eq!(machine.records().unwrap().stats().memory_count, 1);
}

#[test]
fn failed_mutation_does_not_mark_dirty() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();

    let result = machine.mutate(Mutation::DeleteMemory {
        id: emma_types::MemoryId::new(),
    });
    assert!(matches!(result, Err(VaultError::Store(_))));
    assert!(!machine.is_dirty());
}

// End-to-end scenario: media referenced as an avatar disappears from
// the person record when the blob is removed.
#[test]
fn removing_media_clears_avatar_reference() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();

    let outcome = machine
        .mutate(Mutation::AddMedia {
            media: NewMedia {
                bytes: vec![0xFF, 0xD8, 0xFF],
                mime_type: "image/jpeg".to_string(),
                name: "photo.jpg".to_string(),
            },
        })
        .unwrap();
    let MutationOutcome::MediaAdded(media_id) = outcome else {
        panic!("expected MediaAdded, got {outcome:?}");
    };

    let outcome = machine
        .mutate(Mutation::AddPerson {
            person: NewPerson {
                name: "Sam".to_string(),
                avatar_id: Some(media_id),
                ..Default::default()
            },
        })
        .unwrap();
    let MutationOutcome::PersonAdded(person_id) = outcome else {
        panic!("expected PersonAdded, got {outcome:?}");
    };

    machine
        .mutate(Mutation::RemoveMedia { id: media_id })
        .unwrap();

    let records = machine.records().unwrap();
    assert!(records.person(person_id).unwrap().avatar_id.is_none());
    assert!(records.media(media_id).is_none());
}

// ── Flush failure rollback ───────────────────────────────────────

/// A vault file whose writes can be made to fail on demand.
struct FlakyFile {
    inner: AtomicFileWriter,
    fail_writes: AtomicBool,
}

impl FlakyFile {
    fn new(inner: AtomicFileWriter) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl VaultFile for FlakyFile {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn read(&self) -> Result<Vec<u8>, WriteError> {
        self.inner.read()
    }

    fn write(&self, bytes: &[u8]) -> Result<(), WriteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WriteError::Busy("injected failure".to_string()));
        }
        self.inner.write(bytes)
    }
}

#[test]
fn failed_flush_rolls_back_to_last_persisted_state() {
    let temp = TempDir::new().unwrap();
    let file = Arc::new(FlakyFile::new(AtomicFileWriter::new(
        temp.path().join("family.emma"),
    )));
    let mut machine = VaultStateMachine::new(
        file.clone(),
        Arc::new(MemoryStateStore::new()),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(SessionCache::new()),
        KdfParams::fast_insecure(),
    )
    .unwrap();

    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("persisted")).unwrap();
    machine.flush().unwrap();

    file.fail_writes.store(true, Ordering::SeqCst);
    machine.mutate(add_memory("lost to the rollback")).unwrap();
    let result = machine.flush();

    assert!(matches!(result, Err(VaultError::Write(WriteError::Busy(_)))));
    assert!(!machine.is_dirty());
    // The rolled-back store matches what the file holds.
    let records = machine.records().unwrap();
    assert_eq!(records.stats().memory_count, 1);
    assert_eq!(records.memories().next().unwrap().content, "persisted");

    // Once writes work again, new mutations persist normally.
    file.fail_writes.store(false, Ordering::SeqCst);
    machine.mutate(add_memory("second attempt")).unwrap();
    machine.flush().unwrap();
    assert_eq!(machine.records().unwrap().stats().memory_count, 2);
}

// ── Status ───────────────────────────────────────────────────────

#[test]
fn status_reports_counts_and_file_name() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();

    let status = machine.status();
    assert_eq!(status.state, VaultState::Locked);
    assert_eq!(status.memory_count, 0);

    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("one")).unwrap();
    machine
        .mutate(Mutation::AddPerson {
            person: NewPerson {
                name: "Sam".to_string(),
                ..Default::default()
            },
        })
        .unwrap();

    let status = machine.status();
    assert_eq!(status.state, VaultState::Unlocked);
    assert_eq!(status.file_name.as_deref(), Some("Family"));
    assert_eq!(status.memory_count, 1);
    assert_eq!(status.people_count, 1);
}

// ── Passphrase change ────────────────────────────────────────────

#[test]
fn change_passphrase_reencrypts() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();
    machine.mutate(add_memory("secret data")).unwrap();
    machine.flush().unwrap();

    machine.change_passphrase(PASSPHRASE, "new-passphrase-42").unwrap();
    machine.lock().unwrap();

    assert!(matches!(
        machine.unlock(PASSPHRASE),
        Err(VaultError::Authentication)
    ));
    machine.unlock("new-passphrase-42").unwrap();
    assert_eq!(machine.records().unwrap().stats().memory_count, 1);
}

#[test]
fn change_passphrase_with_wrong_old_fails() {
    let fixture = Fixture::new();
    let mut machine = fixture.machine();
    machine.create("Family", PASSPHRASE).unwrap();

    let result = machine.change_passphrase("not the passphrase", "new-passphrase-42");
    assert!(matches!(result, Err(VaultError::Authentication)));
}

// ── Legacy import ────────────────────────────────────────────────

#[test]
fn unlock_refuses_legacy_file_but_import_accepts_it() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("legacy.emma");

    // An old build wrote plain JSON straight to disk.
    let mut legacy = emma_store::RecordStore::new();
    legacy
        .add_memory("from the old app".to_string(), MemoryMetadata::default(), vec![])
        .unwrap();
    std::fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

    let mut machine = VaultStateMachine::new(
        Arc::new(AtomicFileWriter::new(&path)),
        Arc::new(MemoryStateStore::new()),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(SessionCache::new()),
        KdfParams::fast_insecure(),
    )
    .unwrap();

    assert!(matches!(
        machine.unlock(PASSPHRASE),
        Err(VaultError::Format(emma_format::FormatError::LegacyVault))
    ));

    machine.import_legacy_vault(PASSPHRASE).unwrap();
    assert!(machine.is_unlocked());
    assert_eq!(machine.records().unwrap().stats().memory_count, 1);

    // The file on disk is now an encrypted container.
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"EMMA");

    machine.lock().unwrap();
    machine.unlock(PASSPHRASE).unwrap();
    assert_eq!(machine.records().unwrap().stats().memory_count, 1);
}

// ── Error display ────────────────────────────────────────────────

#[test]
fn vault_error_display() {
    let errors = vec![
        VaultError::Locked,
        VaultError::AlreadyUnlocked,
        VaultError::Authentication,
        VaultError::Timeout,
        VaultError::ServiceUnavailable,
        VaultError::Crypto("bad".to_string()),
        VaultError::Write(WriteError::PermissionDenied),
    ];

    for err in &errors {
        assert!(!format!("{err}").is_empty());
        assert!(!format!("{err:?}").is_empty());
    }
}

#[test]
fn authentication_error_reads_as_wrong_passphrase() {
    assert_eq!(VaultError::Authentication.to_string(), "wrong passphrase");
}
