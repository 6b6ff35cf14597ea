//! The remote side of offset resolution.

use crate::error::{BrokerCode, Error, Result};
use crate::queue::MessageQueue;

/// Answers offset queries against the broker hosting a queue.
///
/// Implementations typically perform network I/O and may block;
/// failures are reported as errors and never as magic offset values.
pub trait BrokerOffsetOracle: Send + Sync {
    /// Retrieves the offset the next message appended to `mq` will
    /// get, i.e. the broker's current maximum offset of the queue.
    fn max_offset(&self, mq: &MessageQueue) -> Result<i64>;

    /// Retrieves the offset of the earliest message still available
    /// in `mq`.  Not consulted by offset resolution; oracles unable to
    /// answer it report `BrokerCode::Unknown`.
    fn min_offset(&self, _mq: &MessageQueue) -> Result<i64> {
        Err(Error::Broker(BrokerCode::Unknown))
    }

    /// Retrieves the offset of the first message in `mq` stored at or
    /// after `timestamp_millis` (unix timestamp in milliseconds).
    fn search_offset(&self, mq: &MessageQueue, timestamp_millis: i64) -> Result<i64>;
}
