//! # Node Lock Table
//!
//! Per-character mutual exclusion for edge mutations.
//!
//! A mutation names every character it will read-modify-write and acquires
//! the whole set at once. Acquisition is all-or-nothing under a single
//! condition variable, so two mutations over overlapping sets can never
//! deadlock regardless of the order in which they name their ids.

use crate::CharacterId;
use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Table of characters currently held by a mutation.
#[derive(Debug, Default)]
pub struct NodeLocks {
    held: Mutex<BTreeSet<CharacterId>>,
    released: Condvar,
}

impl NodeLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every id in `ids` is free, then hold them all.
    ///
    /// Duplicate ids are collapsed. The returned guard releases the set on
    /// drop.
    pub fn acquire(&self, ids: impl IntoIterator<Item = CharacterId>) -> NodeLockGuard<'_> {
        let wanted: BTreeSet<CharacterId> = ids.into_iter().collect();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while wanted.iter().any(|id| held.contains(id)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(wanted.iter().copied());

        NodeLockGuard {
            table: self,
            ids: wanted,
        }
    }

    /// Whether a character is currently held.
    #[must_use]
    pub fn is_held(&self, id: CharacterId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn release(&self, ids: &BTreeSet<CharacterId>) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            held.remove(id);
        }
        drop(held);
        self.released.notify_all();
    }
}

/// Holds a set of characters until dropped.
#[derive(Debug)]
pub struct NodeLockGuard<'a> {
    table: &'a NodeLocks,
    ids: BTreeSet<CharacterId>,
}

impl NodeLockGuard<'_> {
    /// Ids held by this guard, ascending.
    pub fn ids(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.ids.iter().copied()
    }
}

impl Drop for NodeLockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.ids);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn guard_releases_on_drop() {
        let locks = NodeLocks::new();
        {
            let guard = locks.acquire([CharacterId(1), CharacterId(2)]);
            assert!(locks.is_held(CharacterId(1)));
            assert_eq!(guard.ids().count(), 2);
        }
        assert!(!locks.is_held(CharacterId(1)));
        assert!(!locks.is_held(CharacterId(2)));
    }

    #[test]
    fn duplicate_ids_collapse() {
        let locks = NodeLocks::new();
        let guard = locks.acquire([CharacterId(3), CharacterId(3)]);
        assert_eq!(guard.ids().count(), 1);
    }

    #[test]
    fn disjoint_sets_do_not_block() {
        let locks = NodeLocks::new();
        let _a = locks.acquire([CharacterId(1)]);
        let _b = locks.acquire([CharacterId(2)]);
        assert!(locks.is_held(CharacterId(1)));
        assert!(locks.is_held(CharacterId(2)));
    }

    #[test]
    fn overlapping_sets_serialize() {
        let locks = Arc::new(NodeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                // Alternate the naming order so opposite orders contend.
                let pair = if i % 2 == 0 {
                    [CharacterId(1), CharacterId(2)]
                } else {
                    [CharacterId(2), CharacterId(1)]
                };
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = locks.acquire(pair);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
