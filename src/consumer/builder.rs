use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::broker::BrokerOffsetOracle;
use crate::error::{Error, Result};
use crate::queue::RETRY_GROUP_TOPIC_PREFIX;
use crate::store::OffsetStore;

use super::config::{self, Config};
use super::lifecycle::MessageQueueListener;
use super::rebalance::PullRebalance;
use super::{ConsumeFromWhere, DEFAULT_CONSUME_FROM_WHERE};

/// A builder easing the process of setting up a `PullRebalance`.
pub struct Builder {
    group: String,
    consume_from_where: ConsumeFromWhere,
    consume_timestamp: Option<String>,
    retry_topic_prefix: String,
    offset_store: Option<Arc<dyn OffsetStore>>,
    broker: Option<Arc<dyn BrokerOffsetOracle>>,
    listener: Option<Arc<dyn MessageQueueListener>>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Builder {{ group: {:?}, consume_from_where: {:?}, consume_timestamp: {:?}, \
                retry_topic_prefix: {:?}, offset_store: {}, broker: {}, listener: {} }}",
            self.group,
            self.consume_from_where,
            self.consume_timestamp,
            self.retry_topic_prefix,
            self.offset_store.is_some(),
            self.broker.is_some(),
            self.listener.is_some()
        )
    }
}

// ~ shared within the consumer module; see `PullRebalance::builder`
pub fn new(group: String) -> Builder {
    Builder {
        group,
        consume_from_where: DEFAULT_CONSUME_FROM_WHERE,
        consume_timestamp: None,
        retry_topic_prefix: RETRY_GROUP_TOPIC_PREFIX.to_owned(),
        offset_store: None,
        broker: None,
        listener: None,
    }
}

impl Builder {
    /// Specifies where to start consuming queues for which the group
    /// has no committed offset yet.
    ///
    /// Queues with a committed offset are always consumed from that
    /// offset on.  The default is `DEFAULT_CONSUME_FROM_WHERE`.
    #[must_use]
    pub fn with_consume_from_where(mut self, consume_from_where: ConsumeFromWhere) -> Builder {
        self.consume_from_where = consume_from_where;
        self
    }

    /// Specifies the point in time, as `yyyyMMddHHmmss` in the local
    /// time zone, to start consuming from with
    /// `ConsumeFromWhere::FromTimestamp`.  Defaults to half an hour
    /// before the builder's `create` is called.
    #[must_use]
    pub fn with_consume_timestamp(mut self, timestamp: String) -> Builder {
        self.consume_timestamp = Some(timestamp);
        self
    }

    /// Specifies the topic name prefix identifying retry topics.
    /// Defaults to `RETRY_GROUP_TOPIC_PREFIX`.
    #[must_use]
    pub fn with_retry_topic_prefix(mut self, prefix: String) -> Builder {
        self.retry_topic_prefix = prefix;
        self
    }

    /// Specifies the store holding the group's committed offsets.
    #[must_use]
    pub fn with_offset_store(mut self, store: Arc<dyn OffsetStore>) -> Builder {
        self.offset_store = Some(store);
        self
    }

    /// Specifies the broker queried for offsets of queues without a
    /// committed offset.
    #[must_use]
    pub fn with_broker(mut self, broker: Arc<dyn BrokerOffsetOracle>) -> Builder {
        self.broker = Some(broker);
        self
    }

    /// Specifies a listener informed about changes of the owned
    /// queues.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn MessageQueueListener>) -> Builder {
        self.listener = Some(listener);
        self
    }

    /// Finally creates the `PullRebalance` based on the so far
    /// supplied settings.
    ///
    /// Fails with `UnsetGroupId`, `UnsetOffsetStorage` or
    /// `UnsetBroker` if the respective setting is missing, and with
    /// `InvalidTimestamp` if consuming from a timestamp is configured
    /// but the timestamp cannot be parsed.
    pub fn create(self) -> Result<PullRebalance> {
        if self.group.is_empty() {
            return Err(Error::UnsetGroupId);
        }
        let store = self.offset_store.ok_or(Error::UnsetOffsetStorage)?;
        let broker = self.broker.ok_or(Error::UnsetBroker)?;
        let consume_timestamp = self
            .consume_timestamp
            .unwrap_or_else(config::default_consume_timestamp);
        if self.consume_from_where == ConsumeFromWhere::FromTimestamp {
            config::parse_consume_timestamp(&consume_timestamp)?;
        }
        let config = Config {
            group: self.group,
            consume_from_where: self.consume_from_where,
            consume_timestamp,
            retry_topic_prefix: self.retry_topic_prefix,
        };
        debug!("initialized: {:?}", config);
        Ok(PullRebalance::new(config, store, broker, self.listener))
    }
}
