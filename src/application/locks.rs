use crate::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entities whose mutations are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Application(ApplicationId),
    Payment(PaymentId),
    Installment(InstallmentId),
    Loan(LoanId),
}

/// Idle entries are dropped once the table grows past this size.
const PRUNE_THRESHOLD: usize = 256;

/// One async mutex per key, created on demand.
///
/// Holding the guard returned by [`KeyedLocks::lock`] makes the caller the
/// single writer for that key. Different keys never contend.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() >= PRUNE_THRESHOLD {
                Self::prune_idle(&mut slots);
            }
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune_idle(&mut slots);
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_idle(slots: &mut HashMap<K, Arc<AsyncMutex<()>>>) {
        // The table's own Arc is the only reference to an idle slot.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
