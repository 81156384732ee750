//! Read-state coordination for concurrent mark-as-read requests.
//!
//! # Responsibility
//! - Admit at most one in-flight read transition per notification id.
//! - Translate store results into caller-facing outcomes without altering
//!   store state.
//!
//! # Invariants
//! - A request for an id with a live pending entry is rejected, never
//!   dispatched.
//! - Pending entries are cleared on every exit path and expire after the
//!   configured TTL even if their owner never returns.
//! - The store call runs outside every arena lock.

mod pending;

use crate::config::FeedConfig;
use crate::model::notification::{Notification, NotificationId};
use crate::repo::notification_repo::{NotificationStore, RepoError};
use log::{info, warn};
use pending::PendingArena;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Why a request was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another request for the same id is still pending.
    InProgress,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(
                f,
                "mark-read already in progress for this notification; await it or retry shortly"
            ),
        }
    }
}

/// Result of one `request_mark_read` call.
#[derive(Debug)]
pub enum MarkReadOutcome {
    /// This request performed the `false -> true` write.
    Transitioned(Notification),
    /// The record was already read; nothing was written.
    AlreadyRead(Notification),
    /// Not dispatched; the store was not called.
    Rejected(RejectReason),
    /// The store call failed; the record is unchanged.
    Failed(RepoError),
}

impl MarkReadOutcome {
    /// The record as observed by this request, when one was observed.
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Self::Transitioned(record) | Self::AlreadyRead(record) => Some(record),
            Self::Rejected(_) | Self::Failed(_) => None,
        }
    }

    /// Whether the caller can treat the record as read.
    pub fn is_read(&self) -> bool {
        self.notification().is_some()
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Transitioned(_) => "transitioned",
            Self::AlreadyRead(_) => "already_read",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
        }
    }
}

/// Serializes mark-read attempts per notification id.
pub struct ReadStateCoordinator<S: NotificationStore> {
    store: Arc<S>,
    pending: PendingArena,
}

impl<S: NotificationStore> ReadStateCoordinator<S> {
    pub fn new(store: Arc<S>, config: &FeedConfig) -> Self {
        Self {
            store,
            pending: PendingArena::new(config.pending_shards, config.pending_ttl),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Attempts the read transition for `id`.
    ///
    /// Returns `Rejected(InProgress)` immediately when another request for
    /// the same id is pending.
    pub fn request_mark_read(&self, id: NotificationId) -> MarkReadOutcome {
        let started_at = Instant::now();
        let Some(_pending) = self.pending.try_acquire(id) else {
            info!(
                "event=mark_read module=coordinator status=rejected reason=in_progress id={id}"
            );
            return MarkReadOutcome::Rejected(RejectReason::InProgress);
        };

        let outcome = match self.store.set_read(id) {
            Ok(change) if change.transitioned => {
                MarkReadOutcome::Transitioned(change.notification)
            }
            Ok(change) => MarkReadOutcome::AlreadyRead(change.notification),
            Err(err) => {
                warn!(
                    "event=mark_read module=coordinator status=error id={id} transient={} error={}",
                    err.is_transient(),
                    err
                );
                MarkReadOutcome::Failed(err)
            }
        };

        info!(
            "event=mark_read module=coordinator status=ok outcome={} id={id} duration_ms={}",
            outcome.label(),
            started_at.elapsed().as_millis()
        );
        outcome
    }

    /// Number of ids with a live pending entry.
    pub fn pending_count(&self) -> usize {
        self.pending.live_count()
    }
}

impl<S: NotificationStore + 'static> ReadStateCoordinator<S> {
    /// Runs `request_mark_read` on a worker thread.
    ///
    /// Dropping the receiver abandons interest only; the transition still
    /// completes (or fails) and the pending entry is still cleared.
    pub fn dispatch_mark_read(self: &Arc<Self>, id: NotificationId) -> Receiver<MarkReadOutcome> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let coordinator = Arc::clone(self);
        thread::spawn(move || {
            let outcome = coordinator.request_mark_read(id);
            if sender.send(outcome).is_err() {
                info!("event=mark_read module=coordinator status=abandoned id={id}");
            }
        });
        receiver
    }
}
