//! # Product Locks
//!
//! One exclusive lock per product id, created on demand. An entry lives
//! while any task holds or waits for it and is removed by the last guard
//! (or abandoned waiter) to go away.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::ProductId;
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

#[derive(Debug)]
struct LockEntry {
    lock: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

type LockTable = Mutex<HashMap<ProductId, LockEntry>>;

/// Table of per-product locks. Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct ProductLocks {
    table: Arc<LockTable>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Not reentrant: acquiring an id
    /// the current task already holds never completes.
    pub async fn acquire(&self, id: &ProductId) -> ProductLockGuard {
        let registration = Registration::new(Arc::clone(&self.table), id.clone());
        let permit = Arc::clone(&registration.lock).lock_owned().await;
        trace!(product_id = %id, "product lock acquired");
        ProductLockGuard {
            _permit: permit,
            _registration: registration,
        }
    }

    /// Number of ids currently held or awaited.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

/// Counts one user of an entry for as long as it lives.
#[derive(Debug)]
struct Registration {
    table: Arc<LockTable>,
    id: ProductId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Registration {
    fn new(table: Arc<LockTable>, id: ProductId) -> Self {
        let lock = {
            let mut entries = table.lock();
            let entry = entries.entry(id.clone()).or_insert_with(|| LockEntry {
                lock: Arc::new(tokio::sync::Mutex::new(())),
                users: 0,
            });
            entry.users += 1;
            Arc::clone(&entry.lock)
        };
        Self { table, id, lock }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut entries = self.table.lock();
        let Some(entry) = entries.get_mut(&self.id) else {
            return;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users == 0 {
            entries.remove(&self.id);
        }
    }
}

/// Exclusive access to one product id; released on drop.
#[derive(Debug)]
pub struct ProductLockGuard {
    // field order: the permit is released before the entry is unregistered
    _permit: OwnedMutexGuard<()>,
    _registration: Registration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::dates::from_millis;
    use std::time::Duration;

    fn id(code: &str) -> ProductId {
        ProductId::new("us", "origin", code, from_millis(1).unwrap())
    }

    #[tokio::test]
    async fn test_exclusive_per_id() {
        let locks = ProductLocks::new();
        let guard = locks.acquire(&id("a")).await;

        let waiting = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&id("a"))).await;
        assert!(waiting.is_err());

        // other ids are independent
        let _other = locks.acquire(&id("b")).await;

        drop(guard);
        let _again = locks.acquire(&id("a")).await;
    }

    #[tokio::test]
    async fn test_entries_removed_when_unused() {
        let locks = ProductLocks::new();
        {
            let _guard = locks.acquire(&id("a")).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_unregisters() {
        let locks = ProductLocks::new();
        let guard = locks.acquire(&id("a")).await;
        let _ = tokio::time::timeout(Duration::from_millis(10), locks.acquire(&id("a"))).await;
        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = ProductLocks::new();
        let guard = locks.acquire(&id("a")).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id("a")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.active(), 0);
    }
}
