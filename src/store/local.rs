use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queue::{MessageQueue, QueueHasher};

use super::{OffsetStore, ReadOffsetType, READ_ERROR_OFFSET, UNKNOWN_OFFSET};

/// The name of the file offsets are persisted to within the store's
/// directory.
pub const OFFSETS_FILE_NAME: &str = "offsets.json";

type DurableTable = HashMap<MessageQueue, i64, QueueHasher>;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OffsetsFile {
    offset_table: Vec<OffsetEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OffsetEntry {
    #[serde(flatten)]
    queue: MessageQueue,
    offset: i64,
}

/// An offset store keeping its durable tier in a JSON file on the
/// local disk.
///
/// The file is loaded lazily on the first read that needs it (or
/// eagerly through `load`) and rewritten as a whole on every
/// `persist`.  Rewrites go through a temporary file; the previous
/// version is kept next to it with a `.bak` extension and is consulted
/// if the main file is missing.
pub struct LocalFileOffsetStore {
    path: PathBuf,
    memory: RwLock<HashMap<MessageQueue, AtomicI64, QueueHasher>>,
    // ~ `None` until the file was read
    durable: Mutex<Option<DurableTable>>,
}

impl fmt::Debug for LocalFileOffsetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LocalFileOffsetStore {{ path: {:?}, in_memory: {} }}",
            self.path,
            self.memory.read().len()
        )
    }
}

impl LocalFileOffsetStore {
    /// Creates a store persisting to `OFFSETS_FILE_NAME` within `dir`.
    /// Nothing is read or written until the store is used.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        LocalFileOffsetStore {
            path: dir.as_ref().join(OFFSETS_FILE_NAME),
            memory: RwLock::new(HashMap::default()),
            durable: Mutex::new(None),
        }
    }

    /// The file this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    fn read_memory(&self, mq: &MessageQueue) -> Option<i64> {
        self.memory
            .read()
            .get(mq)
            .map(|o| o.load(Ordering::SeqCst))
    }

    fn read_store(&self, mq: &MessageQueue) -> i64 {
        let offset = {
            let mut durable = self.durable.lock();
            match self.loaded(&mut durable) {
                Ok(table) => table.get(mq).copied(),
                Err(e) => {
                    warn!("failed to read offsets from {:?}: {}", self.path, e);
                    return READ_ERROR_OFFSET;
                }
            }
        };
        match offset {
            Some(offset) => {
                self.update_offset(mq, offset, false);
                offset
            }
            None => UNKNOWN_OFFSET,
        }
    }

    fn loaded<'a>(&self, slot: &'a mut Option<DurableTable>) -> Result<&'a mut DurableTable> {
        if slot.is_none() {
            *slot = Some(self.read_file()?);
        }
        Ok(slot.get_or_insert_with(HashMap::default))
    }

    fn read_file(&self) -> Result<DurableTable> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match fs::read_to_string(self.backup_path()) {
                    Ok(content) => {
                        warn!("offsets file {:?} missing; using its backup", self.path);
                        content
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Ok(HashMap::default());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        let file: OffsetsFile = serde_json::from_str(&content)?;
        let mut table = HashMap::with_capacity_and_hasher(file.offset_table.len(), QueueHasher::default());
        for entry in file.offset_table {
            table.insert(entry.queue, entry.offset);
        }
        debug!("read {} offsets from {:?}", table.len(), self.path);
        Ok(table)
    }

    fn write_file(&self, table: &DurableTable) -> Result<()> {
        let mut offset_table: Vec<OffsetEntry> = table
            .iter()
            .map(|(queue, &offset)| OffsetEntry {
                queue: queue.clone(),
                offset,
            })
            .collect();
        offset_table.sort_by(|a, b| a.queue.cmp(&b.queue));
        let json = serde_json::to_string_pretty(&OffsetsFile { offset_table })?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn persist_queues<'a, I>(&self, mqs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a MessageQueue>,
    {
        let updates: Vec<(MessageQueue, i64)> = mqs
            .into_iter()
            .filter_map(|mq| self.read_memory(mq).map(|o| (mq.clone(), o)))
            .collect();
        if updates.is_empty() {
            return Ok(());
        }
        let mut durable = self.durable.lock();
        let table = self.loaded(&mut durable)?;
        for (mq, offset) in updates {
            debug!("persisting offset {} for {}", offset, mq);
            table.insert(mq, offset);
        }
        self.write_file(table)
    }
}

impl OffsetStore for LocalFileOffsetStore {
    fn load(&self) -> Result<()> {
        let table = self.read_file()?;
        *self.durable.lock() = Some(table.clone());
        let mut memory = self.memory.write();
        for (mq, offset) in table {
            memory.insert(mq, AtomicI64::new(offset));
        }
        Ok(())
    }

    fn update_offset(&self, mq: &MessageQueue, offset: i64, increase_only: bool) {
        let mut memory = self.memory.write();
        match memory.get(mq) {
            Some(current) if increase_only => {
                current.fetch_max(offset, Ordering::SeqCst);
            }
            Some(current) => current.store(offset, Ordering::SeqCst),
            None => {
                memory.insert(mq.clone(), AtomicI64::new(offset));
            }
        }
    }

    fn read_offset(&self, mq: &MessageQueue, ty: ReadOffsetType) -> i64 {
        match ty {
            ReadOffsetType::MemoryOnly => self.read_memory(mq).unwrap_or(UNKNOWN_OFFSET),
            ReadOffsetType::MemoryFirstThenStore => {
                self.read_memory(mq).unwrap_or_else(|| self.read_store(mq))
            }
            ReadOffsetType::StoreOnly => self.read_store(mq),
        }
    }

    fn persist(&self, mq: &MessageQueue) -> Result<()> {
        self.persist_queues(Some(mq))
    }

    fn persist_all(&self, mqs: &[MessageQueue]) -> Result<()> {
        self.persist_queues(mqs)
    }

    fn remove_offset(&self, mq: &MessageQueue) -> Result<()> {
        if self.memory.write().remove(mq).is_some() {
            debug!("removed in-memory offset for {}", mq);
        }
        Ok(())
    }
}
