//! Message queue identity.

use std::fmt;
use std::hash::BuildHasherDefault;

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

/// The topic name prefix of retry topics, i.e. topics internally
/// generated per consumer group to hold messages whose consumption
/// failed before.
pub const RETRY_GROUP_TOPIC_PREFIX: &str = "%RETRY%";

pub type QueueHasher = BuildHasherDefault<FnvHasher>;

/// One partition of one topic hosted on one broker. This is the unit
/// of ownership distributed among the consumers of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueue {
    topic: String,
    broker_name: String,
    queue_id: i32,
}

impl MessageQueue {
    pub fn new<T, B>(topic: T, broker_name: B, queue_id: i32) -> Self
    where
        T: Into<String>,
        B: Into<String>,
    {
        MessageQueue {
            topic: topic.into(),
            broker_name: broker_name.into(),
            queue_id,
        }
    }

    #[inline]
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[inline]
    #[must_use]
    pub fn broker_name(&self) -> &str {
        &self.broker_name
    }

    #[inline]
    #[must_use]
    pub fn queue_id(&self) -> i32 {
        self.queue_id
    }
}

impl fmt::Display for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.topic, self.broker_name, self.queue_id)
    }
}

/// Determines whether `topic` names a retry topic, i.e. one carrying
/// the reserved `prefix`.
#[inline]
#[must_use]
pub fn is_retry_topic(topic: &str, prefix: &str) -> bool {
    !prefix.is_empty() && topic.starts_with(prefix)
}
