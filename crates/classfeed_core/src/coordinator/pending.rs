//! Pending-mark arena keyed by notification id.
//!
//! # Invariants
//! - At most one live entry per id.
//! - An entry whose deadline has passed is dead and may be reclaimed.
//! - Release only removes the entry carrying the releaser's own ticket.
//! - Ids hash onto independent shards; distinct shards never share a lock.

use crate::model::notification::NotificationId;
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    ticket: u64,
    deadline: Instant,
}

pub(crate) struct PendingArena {
    shards: Vec<Mutex<HashMap<NotificationId, PendingEntry>>>,
    next_ticket: AtomicU64,
    ttl: Duration,
}

impl PendingArena {
    pub(crate) fn new(shard_count: usize, ttl: Duration) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            next_ticket: AtomicU64::new(1),
            ttl,
        }
    }

    /// Test-and-set: returns a guard when `id` had no live entry.
    pub(crate) fn try_acquire(&self, id: NotificationId) -> Option<PendingGuard<'_>> {
        self.try_acquire_for(id, self.ttl)
    }

    fn try_acquire_for(&self, id: NotificationId, ttl: Duration) -> Option<PendingGuard<'_>> {
        let now = Instant::now();
        let mut shard = self.shard(id);

        if let Some(existing) = shard.get(&id) {
            if existing.deadline > now {
                return None;
            }
            warn!(
                "event=pending_reclaim module=coordinator status=expired id={id} ticket={} overdue_ms={}",
                existing.ticket,
                now.duration_since(existing.deadline).as_millis()
            );
        }

        shard.retain(|_, entry| entry.deadline > now);

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        shard.insert(
            id,
            PendingEntry {
                ticket,
                deadline: now + ttl,
            },
        );

        Some(PendingGuard {
            arena: self,
            id,
            ticket,
        })
    }

    /// Number of live (not yet expired) entries across all shards.
    pub(crate) fn live_count(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| {
                lock_shard(shard)
                    .values()
                    .filter(|entry| entry.deadline > now)
                    .count()
            })
            .sum()
    }

    fn release(&self, id: NotificationId, ticket: u64) {
        let mut shard = self.shard(id);
        if shard.get(&id).is_some_and(|entry| entry.ticket == ticket) {
            shard.remove(&id);
        }
    }

    fn shard(&self, id: NotificationId) -> MutexGuard<'_, HashMap<NotificationId, PendingEntry>> {
        let index = (id.as_u128() % self.shards.len() as u128) as usize;
        lock_shard(&self.shards[index])
    }
}

fn lock_shard(
    shard: &Mutex<HashMap<NotificationId, PendingEntry>>,
) -> MutexGuard<'_, HashMap<NotificationId, PendingEntry>> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears its pending entry on drop, including during unwinding.
pub(crate) struct PendingGuard<'a> {
    arena: &'a PendingArena,
    id: NotificationId,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.arena.release(self.id, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::PendingArena;
    use std::thread;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn second_acquire_is_refused_while_first_is_live() {
        let arena = PendingArena::new(4, Duration::from_secs(30));
        let id = Uuid::new_v4();

        let guard = arena.try_acquire(id).expect("first acquire");
        assert!(arena.try_acquire(id).is_none());
        assert_eq!(arena.live_count(), 1);

        drop(guard);
        assert_eq!(arena.live_count(), 0);
        assert!(arena.try_acquire(id).is_some());
    }

    #[test]
    fn distinct_ids_do_not_block_each_other() {
        let arena = PendingArena::new(1, Duration::from_secs(30));
        let _a = arena.try_acquire(Uuid::new_v4()).expect("a");
        let _b = arena.try_acquire(Uuid::new_v4()).expect("b");
        assert_eq!(arena.live_count(), 2);
    }

    #[test]
    fn expired_entry_is_reclaimed_and_stale_guard_keeps_new_entry() {
        let arena = PendingArena::new(2, Duration::from_secs(30));
        let id = Uuid::new_v4();

        let stale = arena
            .try_acquire_for(id, Duration::from_millis(1))
            .expect("first acquire");
        thread::sleep(Duration::from_millis(20));

        let fresh = arena.try_acquire(id).expect("expired entry must be reclaimable");
        drop(stale);
        assert!(
            arena.try_acquire(id).is_none(),
            "stale guard must not clear the newer entry"
        );

        drop(fresh);
        assert!(arena.try_acquire(id).is_some());
    }

    #[test]
    fn zero_shards_falls_back_to_one() {
        let arena = PendingArena::new(0, Duration::from_secs(1));
        assert!(arena.try_acquire(Uuid::new_v4()).is_some());
    }
}
