//! Per-item serialization
//!
//! Requests that touch the same library item are processed one at a time so
//! a burst of clients opening the same title produces a single item query and
//! a single redirect resolution. Different items never wait on each other.
//!
//! Entries are reference counted: a key stays in the registry only while some
//! caller holds or awaits its lock, so the registry is bounded by the number
//! of in-flight requests rather than by the size of the library.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Registry = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Registry of per-key async locks
#[derive(Clone, Default)]
pub struct ItemLock {
    entries: Arc<Registry>,
}

/// Counted reference to one registry entry.
///
/// Dropping the last reference removes the entry, whether it belonged to a
/// holder or to a waiter that gave up.
struct EntryRef {
    key: String,
    entries: Arc<Registry>,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for EntryRef {
    fn drop(&mut self) {
        let mut entries = lock_registry(&self.entries);
        // Clones are only taken under the registry lock, so the count is stable
        // here. Two references left means the map's and ours.
        let unused = entries
            .get(&self.key)
            .is_some_and(|m| Arc::ptr_eq(m, &self.mutex) && Arc::strong_count(m) == 2);
        if unused {
            entries.remove(&self.key);
            trace!(key = %self.key, "Item lock entry removed");
        }
    }
}

/// A caller queued on a key. Fields drop in order: the pending lock future
/// releases its reference before the entry reference is checked.
struct Waiter {
    pending: Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>,
    entry: EntryRef,
}

/// Held lock for one key; released on drop
pub struct ItemLockGuard {
    // Declared first so the lock is released before the entry is checked
    _guard: OwnedMutexGuard<()>,
    entry: EntryRef,
}

fn lock_registry(entries: &Registry) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    // The map is only touched in short non-panicking sections
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ItemLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Waiters on the same key are served in arrival order. Cancelling the
    /// returned future leaves no trace in the registry.
    pub async fn acquire(&self, key: &str) -> ItemLockGuard {
        let mut waiter = {
            let mut entries = lock_registry(&self.entries);
            let mutex = entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone();
            Waiter {
                pending: Box::pin(mutex.clone().lock_owned()),
                entry: EntryRef {
                    key: key.to_string(),
                    entries: self.entries.clone(),
                    mutex,
                },
            }
        };

        trace!(key = %key, "Waiting for item lock");
        let guard = waiter.pending.as_mut().await;
        trace!(key = %key, "Item lock acquired");

        let Waiter { pending, entry } = waiter;
        drop(pending);
        ItemLockGuard {
            _guard: guard,
            entry,
        }
    }

    /// Explicit release, equivalent to dropping the guard
    pub fn release(&self, guard: ItemLockGuard) {
        drop(guard);
    }

    /// Number of keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        lock_registry(&self.entries).len()
    }
}

impl ItemLockGuard {
    pub fn key(&self) -> &str {
        &self.entry.key
    }
}

impl std::fmt::Debug for ItemLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemLockGuard")
            .field("key", &self.entry.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let lock = ItemLock::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire("43609").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(lock.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let lock = ItemLock::new();
        let _held = lock.acquire("a").await;

        let other = tokio::time::timeout(Duration::from_millis(200), lock.acquire("b")).await;
        assert!(other.is_ok());
        assert_eq!(lock.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_waiters_are_served_in_order() {
        let lock = ItemLock::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = lock.acquire("k").await;
        let mut handles = Vec::new();
        for i in 0..3 {
            let lock = lock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire("k").await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the wait queue before spawning the next
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        lock.release(first);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_entry_removed_after_last_release() {
        let lock = ItemLock::new();
        {
            let guard = lock.acquire("item").await;
            assert_eq!(guard.key(), "item");
            assert_eq!(lock.active_keys(), 1);
        }
        assert_eq!(lock.active_keys(), 0);

        // Re-acquiring after removal creates a fresh entry
        let _again = lock.acquire("item").await;
        assert_eq!(lock.active_keys(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_after_release_leaves_no_entry() {
        let lock = ItemLock::new();
        let holder = lock.acquire("k").await;

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.acquire("k").await;
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(holder);
        assert_eq!(lock.active_keys(), 1);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        assert_eq!(lock.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_before_release_leaves_no_entry() {
        let lock = ItemLock::new();
        let holder = lock.acquire("k").await;

        let queued = tokio::time::timeout(Duration::from_millis(20), lock.acquire("k")).await;
        assert!(queued.is_err());
        assert_eq!(lock.active_keys(), 1);

        drop(holder);
        assert_eq!(lock.active_keys(), 0);
    }
}
