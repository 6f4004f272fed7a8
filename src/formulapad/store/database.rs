use super::backend::{PartitionFile, StorageBackend};
use super::StorageUsage;
use crate::error::{FormulaPadError, Result};
use crate::model::{Partition, Record, RecordKey};
use chrono::DateTime;
use serde_json::Value;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// The key-value store adapter: CRUD over the partitions of one database.
///
/// A `Database` is constructed explicitly and shared by `Rc` between the
/// repositories that own its partitions. It must be [`initialize`]d before
/// use; [`close`] puts it back into the unopened state.
///
/// [`initialize`]: Database::initialize
/// [`close`]: Database::close
pub struct Database<B: StorageBackend> {
    backend: B,
    open: Cell<bool>,
    quota: Option<u64>,
}

impl<B: StorageBackend> Database<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            open: Cell::new(false),
            quota: None,
        }
    }

    /// Storage quota reported by [`usage`](Database::usage). Not enforced.
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Open the database, creating every partition (and its index) that is
    /// missing. Calling it again on an open database does nothing.
    pub fn initialize(&self) -> Result<()> {
        if self.open.get() {
            return Ok(());
        }

        self.backend.open()?;
        for partition in Partition::ALL {
            match self.backend.load_partition(partition.name())? {
                None => {
                    debug!(partition = partition.name(), "creating partition");
                    self.backend
                        .save_partition(partition.name(), &PartitionFile::for_partition(partition))?;
                }
                Some(mut file) => {
                    let index = partition.index().map(str::to_string);
                    if file.index != index {
                        debug!(partition = partition.name(), "creating index");
                        file.index = index;
                        self.backend.save_partition(partition.name(), &file)?;
                    }
                }
            }
        }

        self.open.set(true);
        debug!(location = %self.backend.location().display(), "database open");
        Ok(())
    }

    pub fn close(&self) {
        if self.open.replace(false) {
            debug!(location = %self.backend.location().display(), "database closed");
        }
    }

    fn load(&self, partition: Partition) -> Result<PartitionFile> {
        if !self.open.get() {
            return Err(FormulaPadError::Storage("Database is not open".to_string()));
        }
        self.backend
            .load_partition(partition.name())?
            .ok_or_else(|| FormulaPadError::UnknownPartition(partition.name().to_string()))
    }

    fn keyed(file: &PartitionFile) -> BTreeMap<RecordKey, Value> {
        file.records
            .iter()
            .filter_map(|record| {
                record
                    .get(&file.key_path)
                    .and_then(RecordKey::from_value)
                    .map(|key| (key, record.clone()))
            })
            .collect()
    }

    // --- Raw operations ---

    /// Insert or overwrite a record by its key. Records without a key get
    /// the next auto-increment key in auto-keyed partitions.
    pub fn put_value(&self, partition: Partition, mut value: Value) -> Result<Value> {
        let mut file = self.load(partition)?;

        let obj = value.as_object_mut().ok_or_else(|| {
            FormulaPadError::Storage(format!("{} records must be objects", partition))
        })?;

        let key = match obj.get(&file.key_path).and_then(RecordKey::from_value) {
            Some(key) => key,
            None if file.auto_increment => {
                let key = RecordKey::Int(file.next_key);
                obj.insert(file.key_path.clone(), key.to_value());
                key
            }
            None => {
                return Err(FormulaPadError::Storage(format!(
                    "{} record has no `{}`",
                    partition, file.key_path
                )))
            }
        };

        if let RecordKey::Int(n) = key {
            if n >= file.next_key {
                file.next_key = n + 1;
            }
        }

        let mut records = Self::keyed(&file);
        records.insert(key.clone(), value.clone());
        file.records = records.into_values().collect();
        self.backend.save_partition(partition.name(), &file)?;

        debug!(partition = partition.name(), key = %key, "put");
        Ok(value)
    }

    pub fn get_value(&self, partition: Partition, key: &RecordKey) -> Result<Option<Value>> {
        let file = self.load(partition)?;
        Ok(Self::keyed(&file).remove(key))
    }

    /// Every record, in key order. Callers sort as they need.
    pub fn get_all_values(&self, partition: Partition) -> Result<Vec<Value>> {
        let file = self.load(partition)?;
        Ok(Self::keyed(&file).into_values().collect())
    }

    /// Every record, ascending by the partition's index (key order breaks ties).
    pub fn get_all_values_by_index(&self, partition: Partition) -> Result<Vec<Value>> {
        let file = self.load(partition)?;
        let mut records: Vec<(RecordKey, Value)> = Self::keyed(&file).into_iter().collect();
        if let Some(index) = &file.index {
            records.sort_by(|(ka, a), (kb, b)| {
                match index_millis(a.get(index)).cmp(&index_millis(b.get(index))) {
                    Ordering::Equal => ka.cmp(kb),
                    other => other,
                }
            });
        }
        Ok(records.into_iter().map(|(_, v)| v).collect())
    }

    /// Remove a record. Removing an absent key is not an error.
    pub fn delete_value(&self, partition: Partition, key: &RecordKey) -> Result<()> {
        let mut file = self.load(partition)?;
        let mut records = Self::keyed(&file);
        if records.remove(key).is_none() {
            return Ok(());
        }
        file.records = records.into_values().collect();
        self.backend.save_partition(partition.name(), &file)?;
        debug!(partition = partition.name(), key = %key, "delete");
        Ok(())
    }

    pub fn count(&self, partition: Partition) -> Result<usize> {
        Ok(Self::keyed(&self.load(partition)?).len())
    }

    // --- Typed operations ---

    pub fn put<T: Record>(&self, record: &T) -> Result<T> {
        let stored = self.put_value(T::PARTITION, serde_json::to_value(record)?)?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Insert under a freshly assigned key, ignoring any key the record carries.
    pub fn insert_auto<T: Record>(&self, record: &T) -> Result<T> {
        let mut value = serde_json::to_value(record)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove(T::PARTITION.key_path());
        }
        let stored = self.put_value(T::PARTITION, value)?;
        Ok(serde_json::from_value(stored)?)
    }

    pub fn get<T: Record>(&self, key: &RecordKey) -> Result<Option<T>> {
        match self.get_value(T::PARTITION, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        self.get_all_values(T::PARTITION)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(FormulaPadError::Serialization))
            .collect()
    }

    pub fn get_all_by_index<T: Record>(&self) -> Result<Vec<T>> {
        self.get_all_values_by_index(T::PARTITION)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(FormulaPadError::Serialization))
            .collect()
    }

    pub fn delete<T: Record>(&self, key: &RecordKey) -> Result<()> {
        self.delete_value(T::PARTITION, key)
    }

    pub fn usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage::new(self.backend.bytes_used()?, self.quota))
    }
}

/// Index values are ISO-8601 strings or epoch milliseconds.
fn index_millis(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_default(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HistoryEntry, Note, Setting};
    use crate::store::mem_backend::MemBackend;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn open_db() -> Database<MemBackend> {
        let db = Database::new(MemBackend::new());
        db.initialize().unwrap();
        db
    }

    #[test]
    fn initialize_creates_all_partitions() {
        let db = open_db();
        for partition in Partition::ALL {
            assert_eq!(db.count(partition).unwrap(), 0);
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let db = open_db();
        db.put_value(Partition::Notes, json!({"id": "n1", "title": "x"}))
            .unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.backend().open_count(), 1);
        assert_eq!(db.count(Partition::Notes).unwrap(), 1);
    }

    #[test]
    fn operations_fail_before_initialize() {
        let db = Database::new(MemBackend::new());
        let err = db.get_all_values(Partition::Snips).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn close_then_reinitialize_keeps_data() {
        let db = open_db();
        db.put_value(Partition::Settings, json!({"key": "theme", "value": "dark"}))
            .unwrap();
        db.close();
        assert!(db.get_all_values(Partition::Settings).is_err());
        db.initialize().unwrap();
        assert_eq!(db.count(Partition::Settings).unwrap(), 1);
    }

    #[test]
    fn put_on_missing_partition_fails() {
        let db = open_db();
        db.backend().remove_partition("documents");
        let err = db
            .put_value(Partition::Documents, json!({"id": "d1"}))
            .unwrap_err();
        assert!(matches!(err, FormulaPadError::UnknownPartition(_)));
    }

    #[test]
    fn put_overwrites_by_key() {
        let db = open_db();
        db.put_value(Partition::Notes, json!({"id": "a", "title": "one"}))
            .unwrap();
        db.put_value(Partition::Notes, json!({"id": "a", "title": "two"}))
            .unwrap();
        let all = db.get_all_values(Partition::Notes).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["title"], "two");
    }

    #[test]
    fn put_without_key_fails_on_keyed_partition() {
        let db = open_db();
        let err = db
            .put_value(Partition::Notes, json!({"title": "no id"}))
            .unwrap_err();
        assert!(matches!(err, FormulaPadError::Storage(_)));
    }

    #[test]
    fn get_absent_is_none() {
        let db = open_db();
        assert!(db
            .get_value(Partition::Snips, &RecordKey::from("nope"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let db = open_db();
        db.put_value(Partition::Notes, json!({"id": "a"})).unwrap();
        db.delete_value(Partition::Notes, &"a".into()).unwrap();
        db.delete_value(Partition::Notes, &"a".into()).unwrap();
        assert_eq!(db.count(Partition::Notes).unwrap(), 0);
    }

    #[test]
    fn auto_increment_assigns_sequential_keys() {
        let db = open_db();
        let t = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let a = db.insert_auto(&HistoryEntry::new("a", t)).unwrap();
        let b = db.insert_auto(&HistoryEntry::new("b", t)).unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));

        // Keys are never reused after a delete.
        db.delete::<HistoryEntry>(&RecordKey::Int(2)).unwrap();
        let c = db.insert_auto(&HistoryEntry::new("c", t)).unwrap();
        assert_eq!(c.id, Some(3));
    }

    #[test]
    fn get_all_by_index_orders_ascending() {
        let db = open_db();
        db.put_value(
            Partition::Notes,
            json!({"id": "late", "updatedAt": "2025-07-10T14:00:00Z"}),
        )
        .unwrap();
        db.put_value(
            Partition::Notes,
            json!({"id": "early", "updatedAt": "2025-07-01T14:00:00Z"}),
        )
        .unwrap();
        let ids: Vec<_> = db
            .get_all_values_by_index(Partition::Notes)
            .unwrap()
            .into_iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn typed_round_trip() {
        let db = open_db();
        let mut note = Note::new("Title", "Body $x$");
        note.id = "n1".into();
        db.put(&note).unwrap();
        let loaded: Note = db.get(&"n1".into()).unwrap().unwrap();
        assert_eq!(loaded, note);

        db.put(&Setting {
            key: "lang".into(),
            value: json!("fr"),
        })
        .unwrap();
        let settings: Vec<Setting> = db.get_all().unwrap();
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn usage_reports_quota() {
        let db = Database::new(MemBackend::new()).with_quota(Some(1_000_000));
        db.initialize().unwrap();
        let usage = db.usage().unwrap();
        assert!(usage.usage > 0);
        assert!(usage.percent_used.is_some());
    }

    #[test]
    fn index_millis_reads_both_shapes() {
        assert_eq!(index_millis(Some(&json!(1500))), 1500);
        assert_eq!(
            index_millis(Some(&json!("1970-01-01T00:00:01Z"))),
            1000
        );
        assert_eq!(index_millis(None), 0);
    }
}
