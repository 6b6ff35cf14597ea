//! Determines the offset a newly owned queue is consumed from.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::broker::BrokerOffsetOracle;
use crate::error::{Error, Result};
use crate::queue::{is_retry_topic, MessageQueue};
use crate::store::{OffsetStore, ReadOffsetType, UNKNOWN_OFFSET};

use super::config::{self, Config};
use super::ConsumeFromWhere;

/// Computes the offset to resume consumption of a queue from.
///
/// A committed offset always wins.  Only for queues never consumed
/// before by the group the configured `ConsumeFromWhere` policy is
/// applied, consulting the broker where the policy requires.
pub struct OffsetResolver {
    config: Arc<Config>,
    store: Arc<dyn OffsetStore>,
    broker: Arc<dyn BrokerOffsetOracle>,
}

impl fmt::Debug for OffsetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OffsetResolver {{ config: {:?} }}", self.config)
    }
}

impl OffsetResolver {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn OffsetStore>,
        broker: Arc<dyn BrokerOffsetOracle>,
    ) -> OffsetResolver {
        OffsetResolver {
            config,
            store,
            broker,
        }
    }

    /// Resolves the offset to start consuming `mq` from.
    ///
    /// Fails with `Error::OffsetResolution` if the offset store signals
    /// an error or the broker cannot answer; the offset store is never
    /// written to.
    pub fn resolve(&self, mq: &MessageQueue) -> Result<i64> {
        let last_offset = self
            .store
            .read_offset(mq, ReadOffsetType::MemoryFirstThenStore);
        if last_offset >= 0 {
            Ok(last_offset)
        } else if last_offset == UNKNOWN_OFFSET {
            // ~ first start, no offset
            self.find_consume_from_where(mq).map_err(|e| e.resolving(mq))
        } else {
            Err(Error::InvalidOffset(last_offset).resolving(mq))
        }
    }

    fn find_consume_from_where(&self, mq: &MessageQueue) -> Result<i64> {
        let retry = is_retry_topic(mq.topic(), &self.config.retry_topic_prefix);
        let offset = match self.config.consume_from_where {
            // ~ retry queues are drained from the start
            ConsumeFromWhere::FromLastOffset if retry => 0,
            ConsumeFromWhere::FromLastOffset => self.max_offset(mq)?,
            ConsumeFromWhere::FromFirstOffset => 0,
            // ~ timestamps of retry messages reflect their rescheduling
            ConsumeFromWhere::FromTimestamp if retry => self.max_offset(mq)?,
            ConsumeFromWhere::FromTimestamp => {
                let timestamp = config::parse_consume_timestamp(&self.config.consume_timestamp)?;
                let offset = self.broker.search_offset(mq, timestamp).map_err(|e| {
                    warn!(
                        "search offset by timestamp failed (mq: {} / timestamp: {}): {}",
                        mq, timestamp, e
                    );
                    e
                })?;
                validate(offset)?
            }
        };
        debug!(
            "no committed offset for {} ({:?}); starting at {}",
            mq, self.config.consume_from_where, offset
        );
        Ok(offset)
    }

    fn max_offset(&self, mq: &MessageQueue) -> Result<i64> {
        let offset = self.broker.max_offset(mq).map_err(|e| {
            warn!("query max offset failed (mq: {}): {}", mq, e);
            e
        })?;
        validate(offset)
    }
}

// ~ a negative broker answer is not a position to consume from
fn validate(offset: i64) -> Result<i64> {
    if offset < 0 {
        Err(Error::InvalidOffset(offset))
    } else {
        Ok(offset)
    }
}
