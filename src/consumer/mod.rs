//! Rebalance support for pull consumers.
//!
//! When a rebalance of a consumer group hands message queues to and
//! takes them away from a consumer, the consumer needs to settle the
//! offset state of those queues: a gained queue needs an offset to
//! start consuming from, a lost queue needs its last consumed offset
//! persisted before its state is released.  Which consumer owns which
//! queue is decided elsewhere; this module only reacts to the
//! outcome.
//!
//! # Example
//! ```no_run
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! use mqrebalance::broker::BrokerOffsetOracle;
//! use mqrebalance::consumer::{ConsumeFromWhere, PullRebalance};
//! use mqrebalance::store::LocalFileOffsetStore;
//! use mqrebalance::MessageQueue;
//!
//! # fn broker() -> Arc<dyn BrokerOffsetOracle> { unimplemented!() }
//! let rebalance = PullRebalance::builder("my-group".to_owned())
//!     .with_consume_from_where(ConsumeFromWhere::FromFirstOffset)
//!     .with_offset_store(Arc::new(LocalFileOffsetStore::new("/var/lib/my-app")))
//!     .with_broker(broker())
//!     .create()
//!     .unwrap();
//!
//! let all: HashSet<_> = (0..4).map(|id| MessageQueue::new("my-topic", "broker-a", id)).collect();
//! let mine: HashSet<_> = all.iter().filter(|mq| mq.queue_id() % 2 == 0).cloned().collect();
//! rebalance.update_queue_table("my-topic", &all, &mine);
//! for mq in rebalance.owned_queues("my-topic") {
//!     println!("{}: {:?}", mq, rebalance.queue_state(&mq));
//! }
//! ```
//!
//! The offset a gained queue is consumed from is the group's
//! committed offset of that queue.  Only if there is none, the
//! configured `ConsumeFromWhere` decides, with a special case for the
//! group's retry queues: these are always drained as a whole when
//! consuming from the last offset and are started at their current
//! end when consuming from a timestamp.
//!
//! Failures to resolve an offset leave the queue assigned but
//! unresolved; it is resolved again with the next rebalance.

pub use self::builder::Builder;
pub use self::config::{
    default_consume_timestamp, parse_consume_timestamp, Config, CONSUME_TIMESTAMP_FORMAT,
};
pub use self::lifecycle::{ListenerResult, MessageQueueListener, PullRequest, QueueLifecycle};
pub use self::rebalance::PullRebalance;
pub use self::resolver::OffsetResolver;
pub use self::table::QueueState;

mod builder;
mod config;
mod lifecycle;
mod rebalance;
mod resolver;
mod table;


/// The default value for `Builder::with_consume_from_where`.
pub const DEFAULT_CONSUME_FROM_WHERE: ConsumeFromWhere = ConsumeFromWhere::FromLastOffset;

/// Where to start consuming a queue the group has no committed offset
/// for.  See `Builder::with_consume_from_where`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsumeFromWhere {
    /// Skip the backlog; consume only messages arriving from now on.
    FromLastOffset,
    /// Consume everything still available.
    FromFirstOffset,
    /// Consume messages stored as of the configured consume timestamp.
    FromTimestamp,
}

/// How a consumer obtains its messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsumeType {
    /// The application pulls messages explicitly.
    Actively,
    /// Messages are pushed to the application.
    Passively,
}
