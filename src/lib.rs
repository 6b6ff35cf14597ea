//! Offset resolution and queue reassignment for pull-based consumers
//! of a message queue consumer group.  The parts are:
//!
//! - `mqrebalance::consumer::PullRebalance` - reacting to gained and lost queues after a rebalance
//! - `mqrebalance::consumer::OffsetResolver` - determining where to start consuming a gained queue
//! - `mqrebalance::store::OffsetStore` - the committed offsets of the group, with a local file implementation
//! - `mqrebalance::broker::BrokerOffsetOracle` - the broker's view on a queue's offsets
//!
//! See module level documentation corresponding to each part individually.

pub mod broker;
pub mod consumer;
pub mod error;
pub mod queue;
pub mod store;

pub use self::error::{Error, Result};
pub use self::queue::MessageQueue;
