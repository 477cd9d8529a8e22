//! Per-key async locks for read-modify-write sequences against the store.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key, created on demand and dropped once unused.
pub(crate) struct KeyedLocks<K: Eq + Hash + Copy> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Waits until no other holder of `key` remains.
    pub(crate) async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        // The map shard must not stay locked across the await below
        let lock = Arc::clone(&*self.locks.entry(key).or_default());
        let guard = lock.lock_owned().await;
        KeyedGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently locked or waited on.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock on one key; releases and prunes the entry on drop.
pub(crate) struct KeyedGuard<'a, K: Eq + Hash + Copy> {
    owner: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Copy> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold their own clone, so a count of one means nobody needs the entry
        self.owner
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let run = |tag: u32| {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            async move {
                let _held = locks.lock(7).await;
                counter.lock().await.push(tag);
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.lock().await.push(tag);
            }
        };
        tokio::join!(run(1), run(2));

        let order = counter.lock().await.clone();
        assert_eq!(order[0], order[1]);
        assert_eq!(order[2], order[3]);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::<u64>::new();
        let _first = locks.lock(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(2)).await;
        assert!(second.is_ok());
    }
}
