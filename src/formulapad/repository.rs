//! # Domain Repositories
//!
//! A [`Repository`] owns one partition and keeps an in-memory collection of
//! its records, newest first.
//!
//! ## Write Model
//!
//! Every mutation changes the in-memory collection first, then persists.
//! Persistence is best-effort: a failed write is logged and reported through
//! [`Applied::persisted`], but never turned into an error, since the
//! collection has already moved on. Callers that care can reconcile on
//! `persisted == false`.
//!
//! While the [`ConnectivityMonitor`] reports offline, `add` and `remove` also
//! append an `ADD_*` / `DELETE_*` action to the sync queue.
//!
//! ## Loading
//!
//! `load_all` seeds an empty partition from caller-supplied defaults (written
//! one by one) and otherwise returns what is stored. If the read itself fails
//! the defaults are served from memory without being persisted. Every path
//! returns records sorted by ranking timestamp, newest first.

use crate::clock::Clock;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{FormulaPadError, Result};
use crate::model::{Document, Entity, FormulaSnip, Note, Record, SyncAction};
use crate::store::{Database, SlotStorage, StorageBackend};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;
use tracing::warn;

pub type SnipRepository<B> = Repository<FormulaSnip, B>;
pub type NoteRepository<B> = Repository<Note, B>;
pub type DocumentRepository<B> = Repository<Document, B>;

/// Outcome of an optimistic mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    /// Whether the write reached the database.
    pub persisted: bool,
}

/// Time-based ids (epoch milliseconds), strictly increasing within a session.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Cell<i64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now: DateTime<Utc>) -> String {
        let mut millis = now.timestamp_millis();
        if millis <= self.last.get() {
            millis = self.last.get() + 1;
        }
        self.last.set(millis);
        millis.to_string()
    }
}

pub struct Repository<T: Entity, B: StorageBackend + SlotStorage> {
    db: Rc<Database<B>>,
    connectivity: Rc<ConnectivityMonitor<B>>,
    clock: Rc<dyn Clock>,
    ids: Rc<IdGenerator>,
    items: Vec<T>,
}

impl<T: Entity, B: StorageBackend + SlotStorage> Repository<T, B> {
    pub fn new(
        db: Rc<Database<B>>,
        connectivity: Rc<ConnectivityMonitor<B>>,
        clock: Rc<dyn Clock>,
        ids: Rc<IdGenerator>,
    ) -> Self {
        Self {
            db,
            connectivity,
            clock,
            ids,
            items: Vec::new(),
        }
    }

    /// The in-memory collection, newest first.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn load_all(&mut self, defaults: &[T]) -> &[T] {
        match self.db.get_all::<T>() {
            Ok(stored) if !stored.is_empty() => {
                self.items = stored;
            }
            Ok(_) => {
                self.items = defaults.to_vec();
                for record in defaults {
                    self.persist(record);
                }
            }
            Err(e) => {
                warn!(partition = %T::PARTITION, "Failed to load, serving defaults: {e}");
                self.items = defaults.to_vec();
            }
        }
        self.items
            .sort_by_key(|record| std::cmp::Reverse(record.ranking()));
        &self.items
    }

    pub fn add(&mut self, mut record: T) -> Applied<T> {
        let now = self.clock.now();
        if record.id().is_empty() {
            record.set_id(self.ids.next(now));
        }
        record.touch(now, true);

        self.items.insert(0, record.clone());
        let persisted = self.persist(&record);

        if !self.connectivity.is_online() {
            match serde_json::to_value(&record) {
                Ok(data) => self.queue_offline(SyncAction::new(T::ADD_ACTION, data)),
                Err(e) => warn!("Failed to serialize queued record: {e}"),
            }
        }

        Applied {
            value: record,
            persisted,
        }
    }

    /// Remove by id. `value` is the removed record, if it was in the collection.
    pub fn remove(&mut self, id: &str) -> Applied<Option<T>> {
        let removed = self
            .items
            .iter()
            .position(|item| item.id() == id)
            .map(|pos| self.items.remove(pos));

        let persisted = match self.db.delete::<T>(&id.into()) {
            Ok(()) => true,
            Err(e) => {
                warn!(partition = %T::PARTITION, id, "Failed to delete: {e}");
                false
            }
        };

        if !self.connectivity.is_online() {
            self.queue_offline(SyncAction::new(T::DELETE_ACTION, json!({ "id": id })));
        }

        Applied {
            value: removed,
            persisted,
        }
    }

    /// Merge the fields of `patch` (a JSON object) into the record with `id`.
    /// The key field cannot be changed. Returns `Ok(None)` when no such record
    /// is loaded, and a validation error when the merged record no longer
    /// has a valid shape.
    pub fn update(&mut self, id: &str, patch: &Value) -> Result<Option<Applied<T>>> {
        let fields = patch.as_object().ok_or_else(|| {
            FormulaPadError::Validation("update fields must be a JSON object".to_string())
        })?;

        let Some(pos) = self.items.iter().position(|item| item.id() == id) else {
            return Ok(None);
        };

        let key_path = T::PARTITION.key_path();
        let mut merged = serde_json::to_value(&self.items[pos])?;
        if let Some(obj) = merged.as_object_mut() {
            for (field, value) in fields {
                if field != key_path {
                    obj.insert(field.clone(), value.clone());
                }
            }
        }

        let mut updated: T = serde_json::from_value(merged)
            .map_err(|e| FormulaPadError::Validation(format!("invalid update: {e}")))?;
        updated.touch(self.clock.now(), false);

        self.items[pos] = updated.clone();
        let persisted = self.persist(&updated);

        Ok(Some(Applied {
            value: updated,
            persisted,
        }))
    }

    fn persist(&self, record: &T) -> bool {
        match self.db.put(record) {
            Ok(_) => true,
            Err(e) => {
                warn!(partition = %T::PARTITION, key = %record.key(), "Failed to persist: {e}");
                false
            }
        }
    }

    fn queue_offline(&self, action: SyncAction) {
        if let Err(e) = self.connectivity.queue().enqueue(action) {
            warn!("Failed to queue offline action: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connectivity::Connectivity;
    use crate::model::{SnipSource, SyncActionKind};
    use crate::store::mem_backend::MemBackend;
    use crate::sync_queue::{LoggingSink, SyncQueue};
    use chrono::{Duration, TimeZone};

    struct Env {
        db: Rc<Database<MemBackend>>,
        monitor: Rc<ConnectivityMonitor<MemBackend>>,
        clock: Rc<ManualClock>,
        ids: Rc<IdGenerator>,
    }

    impl Env {
        fn new(initial: Connectivity) -> Self {
            let db = Rc::new(Database::new(MemBackend::new()));
            db.initialize().unwrap();
            let clock = Rc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2025, 7, 12, 9, 0, 0).unwrap(),
            ));
            let queue = Rc::new(SyncQueue::new(db.clone(), clock.clone()));
            let monitor = Rc::new(ConnectivityMonitor::new(
                initial,
                queue,
                Box::new(LoggingSink),
            ));
            Self {
                db,
                monitor,
                clock,
                ids: Rc::new(IdGenerator::new()),
            }
        }

        fn repo<T: Entity>(&self) -> Repository<T, MemBackend> {
            Repository::new(
                self.db.clone(),
                self.monitor.clone(),
                self.clock.clone(),
                self.ids.clone(),
            )
        }
    }

    fn note(id: &str, updated: &str) -> Note {
        let at = DateTime::parse_from_rfc3339(updated).unwrap().with_timezone(&Utc);
        Note {
            id: id.to_string(),
            title: format!("Note {id}"),
            content: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn default_notes() -> Vec<Note> {
        vec![
            note("note2", "2025-07-09T11:30:00Z"),
            note("note1", "2025-07-10T14:00:00Z"),
            note("note3", "2025-07-08T16:45:00Z"),
        ]
    }

    #[test]
    fn load_all_seeds_empty_partition() {
        let env = Env::new(Connectivity::Online);
        let mut notes = env.repo::<Note>();
        let ids: Vec<_> = notes
            .load_all(&default_notes())
            .iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(ids, vec!["note1", "note2", "note3"]);
        assert_eq!(env.db.count(Note::PARTITION).unwrap(), 3);
    }

    #[test]
    fn load_all_returns_stored_sorted_without_reseeding() {
        let env = Env::new(Connectivity::Online);
        env.repo::<Note>().load_all(&default_notes());

        let mut fresh = env.repo::<Note>();
        let ids: Vec<_> = fresh
            .load_all(&default_notes())
            .iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(ids, vec!["note1", "note2", "note3"]);
        assert_eq!(env.db.count(Note::PARTITION).unwrap(), 3);
    }

    #[test]
    fn load_all_degrades_to_defaults_on_read_error() {
        let env = Env::new(Connectivity::Online);
        env.db.backend().set_simulate_read_error(true);
        let mut notes = env.repo::<Note>();
        let ids: Vec<_> = notes
            .load_all(&default_notes())
            .iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(ids, vec!["note1", "note2", "note3"]);
        env.db.backend().set_simulate_read_error(false);
        assert_eq!(env.db.count(Note::PARTITION).unwrap(), 0);
    }

    #[test]
    fn add_assigns_monotonic_ids_and_prepends() {
        let env = Env::new(Connectivity::Online);
        let mut snips = env.repo::<FormulaSnip>();
        let a = snips.add(FormulaSnip::new("A", "a", SnipSource::Screenshot));
        let b = snips.add(FormulaSnip::new("B", "b", SnipSource::Screenshot));

        assert!(a.persisted);
        let a_id: i64 = a.value.id.parse().unwrap();
        let b_id: i64 = b.value.id.parse().unwrap();
        assert!(b_id > a_id);
        assert_eq!(snips.items()[0].title, "B");
        assert_eq!(env.db.count(FormulaSnip::PARTITION).unwrap(), 2);
    }

    #[test]
    fn add_keeps_existing_id() {
        let env = Env::new(Connectivity::Online);
        let mut snips = env.repo::<FormulaSnip>();
        let mut snip = FormulaSnip::new("A", "a", SnipSource::Pdf);
        snip.id = "custom".into();
        assert_eq!(snips.add(snip).value.id, "custom");
    }

    #[test]
    fn write_failure_keeps_memory_and_reports() {
        let env = Env::new(Connectivity::Online);
        let mut snips = env.repo::<FormulaSnip>();
        env.db.backend().set_simulate_write_error(true);
        let applied = snips.add(FormulaSnip::new("A", "a", SnipSource::Pdf));
        assert!(!applied.persisted);
        assert_eq!(snips.items().len(), 1);
    }

    #[test]
    fn offline_add_queues_one_action_per_call() {
        let env = Env::new(Connectivity::Offline);
        let mut snips = env.repo::<FormulaSnip>();
        snips.add(FormulaSnip::new("A", "a", SnipSource::Screenshot));
        snips.add(FormulaSnip::new("B", "b", SnipSource::Screenshot));

        let queued = env.monitor.queue().peek().unwrap();
        assert_eq!(queued.len(), 2);
        assert!(queued.iter().all(|a| a.kind == SyncActionKind::AddSnip));
        assert_eq!(queued[0].data["title"], "A");
        assert_eq!(queued[1].data["title"], "B");
    }

    #[test]
    fn online_add_does_not_queue() {
        let env = Env::new(Connectivity::Online);
        env.repo::<FormulaSnip>()
            .add(FormulaSnip::new("A", "a", SnipSource::Screenshot));
        assert!(env.monitor.queue().is_empty().unwrap());
    }

    #[test]
    fn offline_remove_queues_delete_then_online_drains() {
        let env = Env::new(Connectivity::Offline);
        let mut docs = env.repo::<Document>();
        let added = docs.add(Document::new("Calc.pdf", 8, "890 KB")).value;
        let removed = docs.remove(&added.id);

        assert_eq!(removed.value.map(|d| d.id), Some(added.id.clone()));
        assert!(docs.items().is_empty());
        assert_eq!(env.db.count(Document::PARTITION).unwrap(), 0);

        let queued = env.monitor.queue().peek().unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[1].kind, SyncActionKind::DeleteDocument);
        assert_eq!(queued[1].data["id"], added.id.as_str());

        let report = env.monitor.went_online().unwrap();
        assert_eq!(report.attempted, 2);
        assert!(env.monitor.queue().is_empty().unwrap());
    }

    #[test]
    fn update_merges_and_refreshes_updated_at() {
        let env = Env::new(Connectivity::Online);
        let mut notes = env.repo::<Note>();
        notes.load_all(&default_notes());
        env.clock.advance(Duration::days(400));

        let applied = notes
            .update("note2", &json!({"title": "Renamed", "id": "hijack"}))
            .unwrap()
            .unwrap();
        assert_eq!(applied.value.id, "note2");
        assert_eq!(applied.value.title, "Renamed");
        assert_eq!(applied.value.updated_at, env.clock.now());

        let stored: Note = env.db.get(&"note2".into()).unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(env.db.get::<Note>(&"hijack".into()).unwrap().is_none());
    }

    #[test]
    fn update_document_status_keeps_converted_at() {
        let env = Env::new(Connectivity::Online);
        let mut docs = env.repo::<Document>();
        let doc = docs.add(Document::new("Stats.pdf", 18, "1.8 MB")).value;
        env.clock.advance(Duration::minutes(5));
        let updated = docs
            .update(&doc.id, &json!({"status": "converted"}))
            .unwrap()
            .unwrap()
            .value;
        assert_eq!(updated.status, crate::model::DocumentStatus::Converted);
        assert_eq!(updated.converted_at, doc.converted_at);
    }

    #[test]
    fn update_rejects_bad_shapes() {
        let env = Env::new(Connectivity::Online);
        let mut notes = env.repo::<Note>();
        notes.load_all(&default_notes());
        assert!(notes.update("note1", &json!("nope")).is_err());
        assert!(notes.update("note1", &json!({"updatedAt": 12})).is_err());
        assert!(notes.update("missing", &json!({"title": "x"})).unwrap().is_none());
    }

    #[test]
    fn id_generator_is_monotonic_for_equal_times() {
        let ids = IdGenerator::new();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a: i64 = ids.next(t).parse().unwrap();
        let b: i64 = ids.next(t).parse().unwrap();
        let c: i64 = ids.next(t - Duration::seconds(1)).parse().unwrap();
        assert!(a < b && b < c);
    }
}
