use super::backend::{PartitionFile, SlotStorage, StorageBackend};
use crate::error::{FormulaPadError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_DB_NAME: &str = "formulapad";
pub const DB_VERSION: u32 = 1;

pub struct FsBackend {
    root: PathBuf,
    db_name: String,
}

impl FsBackend {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            db_name: DEFAULT_DB_NAME.to_string(),
        }
    }

    pub fn with_db_name(mut self, name: &str) -> Self {
        self.db_name = name.to_string();
        self
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join(format!("{}-v{}", self.db_name, DB_VERSION))
    }

    pub fn slots_dir(&self) -> PathBuf {
        self.root.join("slots")
    }

    fn partition_path(&self, name: &str) -> PathBuf {
        self.db_dir().join(format!("{}.json", name))
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.slots_dir().join(format!("{}.json", key))
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(FormulaPadError::Io)?;
        }
        Ok(())
    }

    /// Write to a temp file in the same directory, then rename over the target.
    fn write_atomic(&self, dir: &Path, target: &Path, content: &[u8]) -> Result<()> {
        self.ensure_dir(dir)?;
        let tmp_path = dir.join(format!(".write-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(FormulaPadError::Io)?;
        if let Err(e) = fs::rename(&tmp_path, target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(FormulaPadError::Io(e));
        }
        Ok(())
    }

    fn dir_size(&self, dir: &Path) -> Result<u64> {
        if !dir.exists() {
            return Ok(0);
        }
        let mut total = 0;
        for entry in fs::read_dir(dir).map_err(FormulaPadError::Io)? {
            let entry = entry.map_err(FormulaPadError::Io)?;
            let meta = entry.metadata().map_err(FormulaPadError::Io)?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

impl StorageBackend for FsBackend {
    fn open(&self) -> Result<()> {
        self.ensure_dir(&self.db_dir())
    }

    fn load_partition(&self, name: &str) -> Result<Option<PartitionFile>> {
        let path = self.partition_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(FormulaPadError::Io)?;
        let file: PartitionFile =
            serde_json::from_str(&content).map_err(FormulaPadError::Serialization)?;
        Ok(Some(file))
    }

    fn save_partition(&self, name: &str, file: &PartitionFile) -> Result<()> {
        let content = serde_json::to_vec_pretty(file).map_err(FormulaPadError::Serialization)?;
        self.write_atomic(&self.db_dir(), &self.partition_path(name), &content)
    }

    fn bytes_used(&self) -> Result<u64> {
        Ok(self.dir_size(&self.db_dir())? + self.dir_size(&self.slots_dir())?)
    }

    fn location(&self) -> PathBuf {
        self.db_dir()
    }
}

impl SlotStorage for FsBackend {
    fn read_slot(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(FormulaPadError::Io)?;
        Ok(Some(content))
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        self.write_atomic(&self.slots_dir(), &self.slot_path(key), value.as_bytes())
    }
}
