//! The queue lifecycle contract shared by consumer variants.

use std::collections::HashSet;
use std::error;
use std::result;

use log::warn;

use crate::error::Result;
use crate::queue::MessageQueue;
use crate::store::UNKNOWN_OFFSET;

use super::ConsumeType;

/// The outcome of an application's `MessageQueueListener` callback.
pub type ListenerResult = result::Result<(), Box<dyn error::Error + Send + Sync>>;

/// Application hook informed about the queues of a topic assigned to
/// this consumer after each rebalance which changed them.
pub trait MessageQueueListener: Send + Sync {
    /// `mq_all` holds all queues of `topic`, `mq_divided` those now
    /// owned by this consumer.
    fn message_queue_changed(
        &self,
        topic: &str,
        mq_all: &HashSet<MessageQueue>,
        mq_divided: &HashSet<MessageQueue>,
    ) -> ListenerResult;
}

impl<F> MessageQueueListener for F
where
    F: Fn(&str, &HashSet<MessageQueue>, &HashSet<MessageQueue>) -> ListenerResult + Send + Sync,
{
    fn message_queue_changed(
        &self,
        topic: &str,
        mq_all: &HashSet<MessageQueue>,
        mq_divided: &HashSet<MessageQueue>,
    ) -> ListenerResult {
        self(topic, mq_all, mq_divided)
    }
}

/// A newly owned queue ready to be pulled from `next_offset` on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    consumer_group: String,
    message_queue: MessageQueue,
    next_offset: i64,
}

impl PullRequest {
    pub fn new(consumer_group: String, message_queue: MessageQueue, next_offset: i64) -> Self {
        PullRequest {
            consumer_group,
            message_queue,
            next_offset,
        }
    }

    #[inline]
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    #[inline]
    #[must_use]
    pub fn message_queue(&self) -> &MessageQueue {
        &self.message_queue
    }

    #[inline]
    #[must_use]
    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }
}

/// Reactions of a consumer to changes of the set of queues it owns.
///
/// The assignment itself is decided elsewhere; implementations only
/// take care of the offset state of gained and lost queues.  All
/// operations on one queue are mutually exclusive while operations on
/// distinct queues proceed independently.
pub trait QueueLifecycle: Send + Sync {
    /// The consumption model of this variant.
    fn consume_type(&self) -> ConsumeType;

    /// Informs the application about the changed queue set of `topic`.
    /// Never fails; a failing listener is logged.
    fn on_queue_set_changed(
        &self,
        topic: &str,
        mq_all: &HashSet<MessageQueue>,
        mq_divided: &HashSet<MessageQueue>,
    );

    /// Releases the offset state of `mq` which is no longer owned.
    /// The in-memory offset is persisted strictly before it is
    /// removed.  Results in `true` if the revocation may be finalized.
    fn on_queue_revoked(&self, mq: &MessageQueue) -> Result<bool>;

    /// Drops the offset state of `mq` without persisting it.
    fn on_dirty_offset_detected(&self, mq: &MessageQueue) -> Result<()>;

    /// Resolves the offset to start consuming `mq` from.
    fn resolve(&self, mq: &MessageQueue) -> Result<i64>;

    /// Resolves the offset to start consuming `mq` from, yielding
    /// `UNKNOWN_OFFSET` instead of failing.  Callers must treat that
    /// value as "retry later", never as an offset.
    #[deprecated(note = "use `resolve` to learn why resolution failed")]
    fn compute_pull_from_where(&self, mq: &MessageQueue) -> i64 {
        self.resolve(mq).unwrap_or_else(|e| {
            warn!("compute consume offset failed (mq: {}): {}", mq, e);
            UNKNOWN_OFFSET
        })
    }

    /// Hands newly owned queues over for active pulling.
    fn dispatch_pull_request(&self, requests: &[PullRequest]);
}
