//! The queue lifecycle of pull consumers.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::broker::BrokerOffsetOracle;
use crate::error::{Error, Result};
use crate::queue::MessageQueue;
use crate::store::OffsetStore;

use super::builder::{self, Builder};
use super::config::Config;
use super::lifecycle::{MessageQueueListener, PullRequest, QueueLifecycle};
use super::resolver::OffsetResolver;
use super::table::{QueueLocks, QueueState, QueueTable};
use super::ConsumeType;

/// The queue lifecycle of a pull consumer.
///
/// Pull consumers have no delivery in flight which would need to be
/// drained before a queue is given up; a revoked queue is released as
/// soon as its offset is persisted.  Pulling itself is driven by the
/// application, `dispatch_pull_request` does nothing.
///
/// See the module level documentation for an example.
pub struct PullRebalance {
    config: Arc<Config>,
    store: Arc<dyn OffsetStore>,
    resolver: OffsetResolver,
    listener: Option<Arc<dyn MessageQueueListener>>,
    table: QueueTable,
    locks: QueueLocks,
}

impl fmt::Debug for PullRebalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PullRebalance {{ config: {:?}, table: {:?}, listener: {} }}",
            self.config,
            self.table,
            self.listener.is_some()
        )
    }
}

impl PullRebalance {
    /// Starts building a pull rebalance on behalf of `group`.
    #[must_use]
    pub fn builder(group: String) -> Builder {
        builder::new(group)
    }

    pub(super) fn new(
        config: Config,
        store: Arc<dyn OffsetStore>,
        broker: Arc<dyn BrokerOffsetOracle>,
        listener: Option<Arc<dyn MessageQueueListener>>,
    ) -> PullRebalance {
        let config = Arc::new(config);
        PullRebalance {
            resolver: OffsetResolver::new(config.clone(), store.clone(), broker),
            config,
            store,
            listener,
            table: QueueTable::default(),
            locks: QueueLocks::default(),
        }
    }

    /// Retrieves the group on which behalf this consumer is acting.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.config.group
    }

    /// The offset store consumed offsets are to be committed to.
    #[must_use]
    pub fn offset_store(&self) -> &Arc<dyn OffsetStore> {
        &self.store
    }

    /// The state of `mq`; `None` if the queue is not owned.
    #[must_use]
    pub fn queue_state(&self, mq: &MessageQueue) -> Option<QueueState> {
        self.table.state(mq)
    }

    /// The owned queues of `topic` in ascending order.
    #[must_use]
    pub fn owned_queues(&self, topic: &str) -> Vec<MessageQueue> {
        self.table.queues_of(topic)
    }

    /// Applies the outcome of a rebalance of `topic`: `mq_all` are all
    /// queues of the topic, `mq_divided` those now assigned to this
    /// consumer.
    ///
    /// Queues no longer assigned are revoked; a queue whose revocation
    /// fails stays owned.  Newly assigned queues have their dirty
    /// offset dropped and their offset resolved.  Queues whose
    /// resolution fails stay unresolved and are resolved again on the
    /// next call.  Results in `true` if the owned queue set changed,
    /// in which case the listener is informed.
    pub fn update_queue_table(
        &self,
        topic: &str,
        mq_all: &HashSet<MessageQueue>,
        mq_divided: &HashSet<MessageQueue>,
    ) -> bool {
        let mut changed = false;

        for mq in self.table.queues_of(topic) {
            if mq_divided.contains(&mq) {
                continue;
            }
            match self.revoke(&mq) {
                Ok(true) => changed = true,
                Ok(false) => {}
                Err(e) => warn!(
                    "failed to revoke {}; keeping it (group: {}): {}",
                    mq, self.config.group, e
                ),
            }
        }

        let mut assigned: Vec<&MessageQueue> =
            mq_divided.iter().filter(|mq| mq.topic() == topic).collect();
        assigned.sort();

        let mut pull_requests = Vec::new();
        for mq in assigned {
            let (added, request) = self.with_queue_lock(mq, || self.assign_queue(mq));
            changed |= added;
            pull_requests.extend(request);
        }

        if !pull_requests.is_empty() {
            self.dispatch_pull_request(&pull_requests);
        }
        if changed {
            self.on_queue_set_changed(topic, mq_all, mq_divided);
        }
        changed
    }

    /// Runs `f` holding the lock of `mq`.  The lock is forgotten
    /// afterwards unless `mq` is owned.
    fn with_queue_lock<T, F>(&self, mq: &MessageQueue, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let lock = self.locks.get(mq);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        if self.table.state(mq).is_none() {
            self.locks.release(mq);
        }
        result
    }

    fn revoke(&self, mq: &MessageQueue) -> Result<bool> {
        self.with_queue_lock(mq, || -> Result<bool> {
            let revoked = self.remove_unnecessary_queue(mq)?;
            if revoked {
                self.table.remove(mq);
            }
            Ok(revoked)
        })
    }

    // ~ expects the lock of `mq` to be held; results in whether `mq`
    // was newly added and its pull request if its offset is resolved
    fn assign_queue(&self, mq: &MessageQueue) -> (bool, Option<PullRequest>) {
        let added = match self.table.state(mq) {
            Some(QueueState::Active { .. }) => return (false, None),
            Some(QueueState::OffsetUnresolved) => false,
            None => {
                // ~ a newly owned queue must not start off stale
                // in-memory state
                if let Err(e) = self.remove_dirty_offset(mq) {
                    warn!("failed to drop dirty offset of {}: {}", mq, e);
                    return (false, None);
                }
                self.table.insert_unresolved(mq);
                true
            }
        };
        match self.resolver.resolve(mq) {
            Ok(offset) => {
                self.table.activate(mq, offset);
                info!(
                    "assigned {} (group: {} / next offset: {})",
                    mq, self.config.group, offset
                );
                let request = PullRequest::new(self.config.group.clone(), mq.clone(), offset);
                (added, Some(request))
            }
            Err(e) => {
                warn!(
                    "failed to resolve offset of {}; retrying with the next rebalance: {}",
                    mq, e
                );
                (added, None)
            }
        }
    }

    // ~ expects the lock of `mq` to be held
    fn remove_unnecessary_queue(&self, mq: &MessageQueue) -> Result<bool> {
        // ~ persist strictly before removing
        self.store.persist(mq).map_err(|e| e.storing(mq))?;
        self.store.remove_offset(mq).map_err(|e| e.storing(mq))?;
        debug!("released offset state of {} (group: {})", mq, self.config.group);
        Ok(true)
    }

    // ~ expects the lock of `mq` to be held
    fn remove_dirty_offset(&self, mq: &MessageQueue) -> Result<()> {
        self.store.remove_offset(mq).map_err(|e| e.storing(mq))?;
        debug!("dropped dirty offset of {} (group: {})", mq, self.config.group);
        Ok(())
    }
}

impl QueueLifecycle for PullRebalance {
    fn consume_type(&self) -> ConsumeType {
        ConsumeType::Actively
    }

    fn on_queue_set_changed(
        &self,
        topic: &str,
        mq_all: &HashSet<MessageQueue>,
        mq_divided: &HashSet<MessageQueue>,
    ) {
        let Some(listener) = &self.listener else {
            return;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            listener.message_queue_changed(topic, mq_all, mq_divided)
        }));
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => Error::Listener(e.to_string()),
            Err(payload) => Error::Listener(panic_message(&*payload)),
        };
        error!("message_queue_changed failed (topic: {}): {}", topic, err);
    }

    fn on_queue_revoked(&self, mq: &MessageQueue) -> Result<bool> {
        self.revoke(mq)
    }

    fn on_dirty_offset_detected(&self, mq: &MessageQueue) -> Result<()> {
        self.with_queue_lock(mq, || self.remove_dirty_offset(mq))
    }

    fn resolve(&self, mq: &MessageQueue) -> Result<i64> {
        self.with_queue_lock(mq, || self.resolver.resolve(mq))
    }

    fn dispatch_pull_request(&self, _requests: &[PullRequest]) {}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_owned()
    }
}
