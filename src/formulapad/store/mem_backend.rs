use super::backend::{PartitionFile, SlotStorage, StorageBackend};
use crate::error::{FormulaPadError, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since formulapad is single-threaded.
/// This avoids the overhead of `RwLock` while still allowing the
/// `StorageBackend` trait to use `&self` for all methods.
#[derive(Default)]
pub struct MemBackend {
    partitions: RefCell<HashMap<String, PartitionFile>>,
    slots: RefCell<HashMap<String, String>>,
    simulate_write_error: Cell<bool>,
    simulate_read_error: Cell<bool>,
    opened: Cell<usize>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Enable read error simulation for testing degraded loads.
    pub fn set_simulate_read_error(&self, simulate: bool) {
        self.simulate_read_error.set(simulate);
    }

    /// How many times `open` reached the backend.
    pub fn open_count(&self) -> usize {
        self.opened.get()
    }

    /// Test helper: drop a partition as if it had never been created.
    pub fn remove_partition(&self, name: &str) -> bool {
        self.partitions.borrow_mut().remove(name).is_some()
    }
}

impl StorageBackend for MemBackend {
    fn open(&self) -> Result<()> {
        self.opened.set(self.opened.get() + 1);
        Ok(())
    }

    fn load_partition(&self, name: &str) -> Result<Option<PartitionFile>> {
        if self.simulate_read_error.get() {
            return Err(FormulaPadError::Storage("Simulated read error".to_string()));
        }
        Ok(self.partitions.borrow().get(name).cloned())
    }

    fn save_partition(&self, name: &str, file: &PartitionFile) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(FormulaPadError::Storage("Simulated write error".to_string()));
        }
        self.partitions
            .borrow_mut()
            .insert(name.to_string(), file.clone());
        Ok(())
    }

    fn bytes_used(&self) -> Result<u64> {
        let partitions = self.partitions.borrow();
        let mut total = 0u64;
        for file in partitions.values() {
            total += serde_json::to_vec(file)?.len() as u64;
        }
        total += self
            .slots
            .borrow()
            .values()
            .map(|v| v.len() as u64)
            .sum::<u64>();
        Ok(total)
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://formulapad")
    }
}

impl SlotStorage for MemBackend {
    fn read_slot(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(FormulaPadError::Storage("Simulated write error".to_string()));
        }
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
