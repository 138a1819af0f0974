use crate::domain::ids::{InstallmentId, PaymentId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// A synthetic gateway callback waiting for its due time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Notification {
    /// Confirms a payment as `SUCCESSFUL`.
    PaymentSettled(PaymentId),
    /// Confirms an installment as `PAID`.
    InstallmentCollected(InstallmentId),
}

#[derive(Default)]
struct QueueState {
    seq: u64,
    by_due: BTreeMap<(DateTime<Utc>, u64), Notification>,
    index: HashMap<Notification, (DateTime<Utc>, u64)>,
}

/// Timer queue of delayed notifications, ordered by due instant.
///
/// The queue holds no clock of its own; callers pass `now` to
/// [`SettlementQueue::take_due`], which lets tests drive it with a manual
/// clock. Each notification is queued at most once; scheduling it again moves
/// its due time.
#[derive(Default)]
pub struct SettlementQueue {
    state: Mutex<QueueState>,
}

impl SettlementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, notification: Notification, due: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = state.index.remove(&notification) {
            state.by_due.remove(&key);
        }
        state.seq += 1;
        let key = (due, state.seq);
        state.by_due.insert(key, notification);
        state.index.insert(notification, key);
    }

    /// Removes a pending notification. Returns `false` if it was not queued.
    pub fn cancel(&self, notification: Notification) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.index.remove(&notification) {
            Some(key) => {
                state.by_due.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Pops every notification due at or before `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut due = Vec::new();
        while let Some(entry) = state.by_due.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let notification = entry.remove();
            state.index.remove(&notification);
            due.push(notification);
        }
        due
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.by_due.keys().next().map(|(due, _)| *due)
    }

    pub fn is_pending(&self, notification: Notification) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.index.contains_key(&notification)
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_due
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
