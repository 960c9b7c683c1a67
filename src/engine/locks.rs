use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per alarm id. Handlers for the same alarm run one at a
/// time; different alarms never contend.
///
/// Slots are never removed: a waiter may still hold a clone of a slot after
/// its alarm is deleted, and a fresh slot for the same id would let two
/// handlers run at once.
#[derive(Default)]
pub struct AlarmLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl AlarmLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: i64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(slots.entry(id).or_default())
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let locks = Arc::new(AlarmLocks::new());
        let guard = locks.acquire(1).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = AlarmLocks::new();
        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;
        assert!(second.is_ok());
    }
}
