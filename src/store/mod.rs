//! Consumed offset storage.
//!
//! An offset store keeps the committed offset of each message queue a
//! consumer owns.  Reads go through two tiers: an in-memory table
//! updated with every commit and the durable backing store the
//! in-memory values are flushed to by `persist`.  Removing an offset
//! evicts the queue's in-memory entry; whatever was persisted before
//! stays with the durable tier.
//!
//! Offsets are signed 64-bit values.  `UNKNOWN_OFFSET` (`-1`) signals
//! "no committed offset known"; any value below it is a store-internal
//! error signal and not an offset.

use crate::error::Result;
use crate::queue::MessageQueue;

pub use self::local::{LocalFileOffsetStore, OFFSETS_FILE_NAME};

mod local;

/// The offset read for a queue without any committed offset.
pub const UNKNOWN_OFFSET: i64 = -1;

/// The offset read for a queue whose durable tier could not be
/// consulted.
pub const READ_ERROR_OFFSET: i64 = -2;

/// Specifies which tier(s) `OffsetStore::read_offset` consults.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadOffsetType {
    /// Only the in-memory table.
    MemoryOnly,
    /// The in-memory table; the durable store if the queue has no
    /// in-memory entry.
    MemoryFirstThenStore,
    /// Only the durable store.  A value found there is cached in the
    /// in-memory table.
    StoreOnly,
}

/// Durable mapping from message queue to committed offset.
///
/// Implementations serialize operations on a single queue internally;
/// callers do not need to coordinate reads and writes of one queue
/// among themselves.
pub trait OffsetStore: Send + Sync {
    /// Loads previously persisted offsets, if any.
    fn load(&self) -> Result<()>;

    /// Records `offset` for `mq` in the in-memory table.  With
    /// `increase_only` set an existing larger offset is kept.
    fn update_offset(&self, mq: &MessageQueue, offset: i64, increase_only: bool);

    /// Reads the committed offset of `mq`.  Yields `UNKNOWN_OFFSET` if
    /// the consulted tier(s) know nothing about the queue and a value
    /// below `UNKNOWN_OFFSET` if the durable tier failed.
    fn read_offset(&self, mq: &MessageQueue, ty: ReadOffsetType) -> i64;

    /// Flushes the in-memory offset of `mq` to the durable store.
    fn persist(&self, mq: &MessageQueue) -> Result<()>;

    /// Flushes the in-memory offsets of all of `mqs` to the durable
    /// store.
    fn persist_all(&self, mqs: &[MessageQueue]) -> Result<()>;

    /// Evicts `mq` from the in-memory table.
    fn remove_offset(&self, mq: &MessageQueue) -> Result<()>;
}
