//! # Storage Layer
//!
//! The storage layer is an embedded key-value database split into named
//! partitions (see [`Partition`](crate::model::Partition)). It is the only
//! code that knows how records reach the disk; everything above it talks to
//! [`Database`].
//!
//! ## Two Levels
//!
//! 1. **Backend** ([`backend::StorageBackend`]): raw I/O. Loads and saves whole
//!    partition files and string-keyed slots. Knows nothing about keys, indexes
//!    or record shapes.
//! 2. **Adapter** ([`Database`]): the CRUD primitive (`put`, `get`, `get_all`,
//!    `delete`) over partitions, key extraction, auto-increment keys and
//!    index-ordered reads.
//!
//! Each call is atomic on its own partition. Nothing spans partitions, so a
//! caller doing "delete from A, add to B" must tolerate partial completion.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: production backend, one JSON file per partition.
//! - [`mem_backend::MemBackend`]: in-process backend for tests, with failure injection.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── formulapad-v1/
//! │   ├── snips.json       # {keyPath, index, autoIncrement, nextKey, records: [...]}
//! │   ├── notes.json
//! │   ├── documents.json
//! │   ├── settings.json
//! │   └── history.json
//! └── slots/
//!     └── formulapad_sync_queue.json
//! ```

use serde::Serialize;

pub mod backend;
pub mod database;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::{PartitionFile, SlotStorage, StorageBackend};
pub use database::Database;

/// Estimate of the space taken by the database and its slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageUsage {
    pub usage: u64,
    pub quota: Option<u64>,
    pub percent_used: Option<f64>,
}

impl StorageUsage {
    pub fn new(usage: u64, quota: Option<u64>) -> Self {
        let percent_used = quota
            .filter(|q| *q > 0)
            .map(|q| ((usage as f64 / q as f64) * 10000.0).round() / 100.0);
        Self {
            usage,
            quota,
            percent_used,
        }
    }
}
