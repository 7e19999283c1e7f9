//! Per-key async mutual exclusion.
//!
//! Operations on the same key are totally ordered; operations on distinct
//! keys never wait on each other. The shared table is only touched under a
//! short synchronous lock and never across an `.await`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// A table of async mutexes created on demand, one per key.
///
/// Entries are removed once the last holder or waiter is gone, so the table
/// only grows with the number of keys in use.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Slot>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Ord + Clone> KeyedLocks<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyGuard<'_, K> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = slot.lock_owned().await;
        KeyGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    /// Wait for exclusive access to every key in `keys`.
    ///
    /// Keys are deduplicated and acquired in ascending order, so two callers
    /// locking overlapping sets cannot deadlock.
    pub async fn lock_all(&self, mut keys: Vec<K>) -> Vec<KeyGuard<'_, K>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of keys currently locked or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, key: &K) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(key);
        }
    }
}

/// Exclusive access to one key, released on drop.
pub struct KeyGuard<'a, K: Eq + Hash + Ord + Clone> {
    owner: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Ord + Clone> KeyGuard<'_, K> {
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Ord + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // the owned guard holds a reference to the slot; drop it before counting
        drop(self.guard.take());
        self.owner.release(&self.key);
    }
}
