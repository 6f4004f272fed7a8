use crate::error::Result;
use crate::model::Partition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

fn first_key() -> u64 {
    1
}

/// On-disk shape of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionFile {
    pub key_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default = "first_key")]
    pub next_key: u64,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl PartitionFile {
    /// An empty partition following the schema of `partition`.
    pub fn for_partition(partition: Partition) -> Self {
        Self {
            key_path: partition.key_path().to_string(),
            index: partition.index().map(str::to_string),
            auto_increment: partition.auto_increment(),
            next_key: first_key(),
            records: Vec::new(),
        }
    }
}

/// Abstract interface for raw storage I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while [`Database`](super::Database) handles the "what" (keys, indexes, CRUD).
pub trait StorageBackend {
    /// Create whatever container the partitions live in (directory, map).
    fn open(&self) -> Result<()>;

    /// Load a partition. Returns Ok(None) when the partition was never created.
    fn load_partition(&self, name: &str) -> Result<Option<PartitionFile>>;

    /// Replace a partition.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save_partition(&self, name: &str, file: &PartitionFile) -> Result<()>;

    /// Bytes currently used by partitions and slots.
    fn bytes_used(&self) -> Result<u64>;

    /// Where the data lives. For MemBackend, a virtual path.
    fn location(&self) -> PathBuf;
}

/// String-keyed slots living outside the partitions.
pub trait SlotStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>>;

    fn write_slot(&self, key: &str, value: &str) -> Result<()>;
}
