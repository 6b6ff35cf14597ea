//! Book keeping of the queues owned by a consumer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::queue::{MessageQueue, QueueHasher};

/// The state of an owned queue.  Queues not owned have no state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueState {
    /// Assigned, but the offset to start from is not known yet.
    OffsetUnresolved,
    /// Assigned and consumable from `offset` on.
    Active { offset: i64 },
}

#[derive(Debug, Default)]
pub struct QueueTable {
    queues: RwLock<HashMap<MessageQueue, QueueState, QueueHasher>>,
}

impl QueueTable {
    pub fn state(&self, mq: &MessageQueue) -> Option<QueueState> {
        self.queues.read().get(mq).copied()
    }

    /// The owned queues of `topic` in ascending order.
    pub fn queues_of(&self, topic: &str) -> Vec<MessageQueue> {
        let mut mqs: Vec<_> = self
            .queues
            .read()
            .keys()
            .filter(|mq| mq.topic() == topic)
            .cloned()
            .collect();
        mqs.sort();
        mqs
    }

    /// Registers `mq` as owned.  Results in `false` if it was already.
    pub fn insert_unresolved(&self, mq: &MessageQueue) -> bool {
        let mut queues = self.queues.write();
        if queues.contains_key(mq) {
            return false;
        }
        queues.insert(mq.clone(), QueueState::OffsetUnresolved);
        true
    }

    /// Marks the owned `mq` as active.  Results in `false` if `mq` is
    /// not owned (anymore).
    pub fn activate(&self, mq: &MessageQueue, offset: i64) -> bool {
        match self.queues.write().get_mut(mq) {
            Some(state) => {
                *state = QueueState::Active { offset };
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, mq: &MessageQueue) -> Option<QueueState> {
        self.queues.write().remove(mq)
    }
}

/// One mutex per queue serializing the lifecycle operations on it.
#[derive(Debug, Default)]
pub struct QueueLocks {
    locks: Mutex<HashMap<MessageQueue, Arc<Mutex<()>>, QueueHasher>>,
}

impl QueueLocks {
    /// The lock of `mq`; created on first use.
    pub fn get(&self, mq: &MessageQueue) -> Arc<Mutex<()>> {
        self.locks.lock().entry(mq.clone()).or_default().clone()
    }

    /// Forgets the lock of `mq` unless somebody still holds on to it.
    pub fn release(&self, mq: &MessageQueue) {
        let mut locks = self.locks.lock();
        // ~ new references are handed out only under `locks`
        if locks.get(mq).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(mq);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
