use classfeed_core::db::{open_db_in_memory, DbError};
use classfeed_core::{
    FeedConfig, MarkReadOutcome, Notification, NotificationId, NotificationStore,
    NotificationType, ReadChange, ReadStateCoordinator, RejectReason, RepoError, RepoResult,
    SqliteNotificationStore,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Wraps the SQLite store; the first armed `set_read` blocks until released.
struct GatedStore {
    inner: SqliteNotificationStore,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    transitions: AtomicUsize,
    fail_writes: AtomicBool,
}

struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: SqliteNotificationStore::try_new(open_db_in_memory().unwrap()).unwrap(),
            gate: Mutex::new(None),
            transitions: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn arm(&self) -> Gate {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    fn seed(&self, recipient: &str) -> NotificationId {
        let record = Notification::new(recipient, NotificationType::GradePosted, "Grade", "", 1);
        self.inner.create_notification(&record).unwrap()
    }

    fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl NotificationStore for GatedStore {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        self.inner.create_notification(notification)
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        self.inner.get_notification(id)
    }

    fn list_by_recipient(&self, recipient_id: &str) -> RepoResult<Vec<Notification>> {
        self.inner.list_by_recipient(recipient_id)
    }

    fn set_read(&self, id: NotificationId) -> RepoResult<ReadChange> {
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                None,
            ))));
        }
        let change = self.inner.set_read(id)?;
        if change.transitioned {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(change)
    }

    fn count_unread(&self, recipient_id: &str) -> RepoResult<u64> {
        self.inner.count_unread(recipient_id)
    }
}

fn coordinator_with(
    config: FeedConfig,
) -> (Arc<GatedStore>, Arc<ReadStateCoordinator<GatedStore>>) {
    let store = Arc::new(GatedStore::new());
    let coordinator = Arc::new(ReadStateCoordinator::new(Arc::clone(&store), &config));
    (store, coordinator)
}

#[test]
fn concurrent_request_for_same_id_is_rejected_and_written_once() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let id = store.seed("student-1");
    let gate = store.arm();

    let first = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_mark_read(id))
    };
    gate.entered.recv().unwrap();
    assert_eq!(coordinator.pending_count(), 1);

    let second = coordinator.request_mark_read(id);
    assert!(matches!(
        second,
        MarkReadOutcome::Rejected(RejectReason::InProgress)
    ));
    assert!(!second.is_read());

    gate.release.send(()).unwrap();
    let first = first.join().unwrap();
    assert!(matches!(first, MarkReadOutcome::Transitioned(ref record) if record.read));

    let third = coordinator.request_mark_read(id);
    assert!(matches!(third, MarkReadOutcome::AlreadyRead(ref record) if record.read));

    assert_eq!(store.transitions(), 1);
    assert_eq!(coordinator.pending_count(), 0);
}

#[test]
fn unknown_id_fails_with_not_found_and_clears_pending() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let missing = Uuid::new_v4();

    let outcome = coordinator.request_mark_read(missing);
    assert!(matches!(
        outcome,
        MarkReadOutcome::Failed(RepoError::NotFound(id)) if id == missing
    ));
    assert_eq!(coordinator.pending_count(), 0);
    assert!(store.get_notification(missing).unwrap().is_none());
}

#[test]
fn failed_write_leaves_record_unread_and_allows_retry() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let id = store.seed("student-1");
    store.fail_writes.store(true, Ordering::SeqCst);

    let outcome = coordinator.request_mark_read(id);
    match outcome {
        MarkReadOutcome::Failed(err) => assert!(err.is_transient()),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!store.get_notification(id).unwrap().unwrap().read);
    assert_eq!(coordinator.pending_count(), 0);

    store.fail_writes.store(false, Ordering::SeqCst);
    let retry = coordinator.request_mark_read(id);
    assert!(matches!(retry, MarkReadOutcome::Transitioned(_)));
}

#[test]
fn distinct_ids_do_not_block_each_other() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let blocked = store.seed("student-1");
    let other = store.seed("student-1");
    let gate = store.arm();

    let first = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_mark_read(blocked))
    };
    gate.entered.recv().unwrap();

    let outcome = coordinator.request_mark_read(other);
    assert!(matches!(outcome, MarkReadOutcome::Transitioned(_)));

    gate.release.send(()).unwrap();
    assert!(matches!(
        first.join().unwrap(),
        MarkReadOutcome::Transitioned(_)
    ));
    assert_eq!(store.transitions(), 2);
}

#[test]
fn expired_pending_entry_is_reclaimed_by_next_request() {
    let config = FeedConfig {
        pending_ttl: Duration::from_millis(20),
        ..FeedConfig::default()
    };
    let (store, coordinator) = coordinator_with(config);
    let id = store.seed("student-1");
    let gate = store.arm();

    let stuck = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_mark_read(id))
    };
    gate.entered.recv().unwrap();
    thread::sleep(Duration::from_millis(80));

    let reclaimed = coordinator.request_mark_read(id);
    assert!(matches!(reclaimed, MarkReadOutcome::Transitioned(_)));

    gate.release.send(()).unwrap();
    assert!(matches!(
        stuck.join().unwrap(),
        MarkReadOutcome::AlreadyRead(_)
    ));
    assert_eq!(store.transitions(), 1);
    assert_eq!(coordinator.pending_count(), 0);
}

#[test]
fn abandoned_dispatch_still_completes_and_clears_pending() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let id = store.seed("student-1");

    drop(coordinator.dispatch_mark_read(id));

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let read = store.get_notification(id).unwrap().unwrap().read;
        if read && coordinator.pending_count() == 0 {
            break;
        }
        assert!(Instant::now() < deadline, "abandoned mark-read never settled");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(store.transitions(), 1);
}

#[test]
fn dispatch_delivers_outcome_to_an_attentive_caller() {
    let (store, coordinator) = coordinator_with(FeedConfig::default());
    let id = store.seed("student-1");

    let outcome = coordinator
        .dispatch_mark_read(id)
        .recv_timeout(Duration::from_secs(5))
        .unwrap();
    assert!(matches!(outcome, MarkReadOutcome::Transitioned(ref record) if record.id == id));
}
