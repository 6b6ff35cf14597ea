//! Error struct and methods

use std::{io, result};
use thiserror::Error;

use crate::queue::MessageQueue;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An error as reported by a remote broker
    #[error("Broker Error ({0:?})")]
    Broker(BrokerCode),

    /// The starting offset of a queue could not be determined.
    /// Contains the queue and the underlying cause; the queue's
    /// assignment is expected to be retried on the next rebalance.
    #[error("Offset Resolution Error ({queue}): {source}")]
    OffsetResolution {
        queue: MessageQueue,
        #[source]
        source: Box<Error>,
    },

    /// An offset value which must not be handed out as a position,
    /// e.g. a store-internal error sentinel or a negative broker answer
    #[error("Invalid offset ({0})")]
    InvalidOffset(i64),

    /// Persisting or removing the offset of a queue failed
    #[error("Offset Store Error ({queue}): {source}")]
    Store {
        queue: MessageQueue,
        #[source]
        source: Box<Error>,
    },

    /// An application callback failed; logged, never propagated out
    /// of a rebalance
    #[error("Listener Error ({0})")]
    Listener(String),

    /// A consume timestamp not in the `yyyyMMddHHmmss` format
    #[error("Invalid consume timestamp ({0:?})")]
    InvalidTimestamp(String),

    #[error("Operation requires offset storage but no offset storage was set")]
    UnsetOffsetStorage,

    #[error("Operation requires a broker but no broker was set")]
    UnsetBroker,

    #[error("Operation requires group id but no group was set")]
    UnsetGroupId,
}

impl Error {
    /// Wraps `self` as the cause of a failed offset resolution for
    /// `queue`.
    pub fn resolving(self, queue: &MessageQueue) -> Error {
        match self {
            e @ Error::OffsetResolution { .. } => e,
            e => Error::OffsetResolution {
                queue: queue.clone(),
                source: Box::new(e),
            },
        }
    }

    /// Wraps `self` as the cause of a failed store mutation for `queue`.
    pub fn storing(self, queue: &MessageQueue) -> Error {
        match self {
            e @ Error::Store { .. } => e,
            e => Error::Store {
                queue: queue.clone(),
                source: Box::new(e),
            },
        }
    }

    /// Determines whether this error signals a failed offset
    /// resolution, i.e. one to be retried with the next rebalance.
    #[must_use]
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Error::OffsetResolution { .. })
    }
}

/// Various errors reported by a remote broker when queried for queue
/// offsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BrokerCode {
    /// An unexpected server error
    Unknown,
    /// The queried topic or queue does not exist on the broker
    QueueNotFound,
    /// No address is known for the broker hosting the queue, or the
    /// broker could not be reached
    BrokerNotAvailable,
    /// The request exceeded its time limit
    RequestTimedOut,
    /// The broker rejected the request due to being overloaded
    SystemBusy,
    /// The client is not allowed to query the queue
    NoPermission,
}
