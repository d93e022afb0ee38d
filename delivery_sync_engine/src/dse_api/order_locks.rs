use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process, per-order mutual exclusion. At most one reconciliation (or dispatch, or OTP update) holds the guard
/// for a given order at any time. Writers outside this process are caught by the delivery version check instead.
#[derive(Clone, Default)]
pub struct OrderLocks {
    inflight: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            // Locks nobody holds or waits on can go
            inflight.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(inflight.entry(order_id).or_default())
        };
        lock.lock_owned().await
    }

    /// The number of orders with a live lock entry.
    pub async fn len(&self) -> usize {
        self.inflight.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn one_holder_per_order() {
        let locks = OrderLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire(7).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_orders_do_not_block_each_other() {
        let locks = OrderLocks::new();
        let _a = locks.acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = OrderLocks::new();
        {
            let _a = locks.acquire(1).await;
            let _b = locks.acquire(2).await;
        }
        let _c = locks.acquire(3).await;
        assert_eq!(locks.len().await, 1);
    }
}
