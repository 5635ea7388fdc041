//! Per-key provisioning exclusion
//!
//! Optional stricter mode for the provisioning gates. While a key's guard is
//! held, other callers for the same key wait; once they acquire it they
//! re-read the state store, so a successful first attempt satisfies every
//! queued caller without further network calls.

use super::traits::{RoomId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Key a provisioning attempt is serialized on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProvisionKey {
    Register(UserId),
    Join(UserId, RoomId),
}

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Shared table of per-key async mutexes
#[derive(Debug, Default, Clone)]
pub struct ProvisioningLocks {
    slots: Arc<Mutex<HashMap<ProvisionKey, Slot>>>,
}

/// Held while a provisioning attempt for one key is in flight
///
/// Dropping the guard releases the key and prunes its slot once unused.
#[derive(Debug)]
pub struct ProvisionGuard {
    key: ProvisionKey,
    slots: Arc<Mutex<HashMap<ProvisionKey, Slot>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ProvisioningLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: ProvisionKey) -> ProvisionGuard {
        let slot = {
            let mut slots = lock_table(&self.slots);
            slots.entry(key.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        ProvisionGuard {
            key,
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Number of keys with a holder or waiter
    pub fn active_keys(&self) -> usize {
        lock_table(&self.slots).len()
    }
}

impl Drop for ProvisionGuard {
    fn drop(&mut self) {
        // Release before pruning so the count below only sees waiters.
        drop(self.guard.take());

        let mut slots = lock_table(&self.slots);
        if let Some(slot) = slots.get(&self.key) {
            // The table's own reference is the only one left.
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.key);
            }
        }
    }
}

fn lock_table(
    slots: &Mutex<HashMap<ProvisionKey, Slot>>,
) -> MutexGuard<'_, HashMap<ProvisionKey, Slot>> {
    // The table holds no invariant a panicking holder could break.
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}
