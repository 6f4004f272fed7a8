//! # Formula History
//!
//! A capped, deduplicated log of recently produced formulas, kept in its own
//! auto-keyed partition.
//!
//! - **Dedup**: appending a latex string that was appended less than the
//!   dedup window ago (60 s by default) does nothing.
//! - **Cap**: after each insert, the oldest entries (timestamp ascending,
//!   insertion key breaking ties) are deleted until at most `cap` (30) remain.
//!
//! Eviction is strict FIFO by insertion time; reading an entry never promotes it.

use crate::clock::Clock;
use crate::error::Result;
use crate::model::{HistoryEntry, RecordKey};
use crate::store::{Database, StorageBackend};
use chrono::Duration;
use std::rc::Rc;
use tracing::debug;

pub const HISTORY_CAP: usize = 30;
pub const DEDUP_WINDOW_SECS: i64 = 60;

pub struct HistoryRepository<B: StorageBackend> {
    db: Rc<Database<B>>,
    clock: Rc<dyn Clock>,
    cap: usize,
    dedup_window: Duration,
}

impl<B: StorageBackend> HistoryRepository<B> {
    pub fn new(db: Rc<Database<B>>, clock: Rc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            cap: HISTORY_CAP,
            dedup_window: Duration::seconds(DEDUP_WINDOW_SECS),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Record a formula. Returns `None` when it duplicates a recent entry.
    pub fn append(&self, latex: &str) -> Result<Option<HistoryEntry>> {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let window_ms = self.dedup_window.num_milliseconds();

        let entries: Vec<HistoryEntry> = self.db.get_all()?;
        let duplicate = entries
            .iter()
            .any(|e| e.latex == latex && now_ms - e.timestamp < window_ms);
        if duplicate {
            debug!("skipping duplicate history entry");
            return Ok(None);
        }

        let stored = self.db.insert_auto(&HistoryEntry::new(latex, now))?;
        self.evict()?;
        Ok(Some(stored))
    }

    /// Delete the oldest entries beyond the cap. Returns how many were removed.
    fn evict(&self) -> Result<usize> {
        let oldest_first: Vec<HistoryEntry> = self.db.get_all_by_index()?;
        if oldest_first.len() <= self.cap {
            return Ok(0);
        }

        let surplus = oldest_first.len() - self.cap;
        for entry in oldest_first.iter().take(surplus) {
            self.db.delete::<HistoryEntry>(&RecordKey::Int(entry.id.unwrap_or_default()))?;
        }
        debug!(evicted = surplus, "history cap reached");
        Ok(surplus)
    }

    pub fn remove(&self, id: u64) -> Result<()> {
        self.db.delete::<HistoryEntry>(&RecordKey::Int(id))
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self.db.get_all_by_index()?;
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Partition;
    use crate::store::mem_backend::MemBackend;
    use chrono::{TimeZone, Utc};

    fn setup() -> (HistoryRepository<MemBackend>, Rc<ManualClock>) {
        let db = Rc::new(Database::new(MemBackend::new()));
        db.initialize().unwrap();
        let clock = Rc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 7, 10, 8, 0, 0).unwrap(),
        ));
        (HistoryRepository::new(db, clock.clone()), clock)
    }

    fn count(history: &HistoryRepository<MemBackend>) -> usize {
        history.db.count(Partition::History).unwrap()
    }

    #[test]
    fn count_never_exceeds_cap() {
        let (history, clock) = setup();
        for i in 0..75 {
            history.append(&format!("x_{i}")).unwrap();
            assert!(count(&history) <= HISTORY_CAP);
            clock.advance(Duration::seconds(1));
        }
        assert_eq!(count(&history), HISTORY_CAP);
    }

    #[test]
    fn duplicate_within_window_is_skipped() {
        let (history, clock) = setup();
        assert!(history.append("a^2 + b^2 = c^2").unwrap().is_some());
        clock.advance(Duration::seconds(59));
        assert!(history.append("a^2 + b^2 = c^2").unwrap().is_none());
        assert_eq!(count(&history), 1);
    }

    #[test]
    fn duplicate_after_window_is_kept() {
        let (history, clock) = setup();
        history.append("e^{i\\pi} + 1 = 0").unwrap();
        clock.advance(Duration::seconds(61));
        assert!(history.append("e^{i\\pi} + 1 = 0").unwrap().is_some());
        assert_eq!(count(&history), 2);
    }

    #[test]
    fn different_latex_is_never_deduplicated() {
        let (history, _) = setup();
        history.append("a").unwrap();
        history.append("b").unwrap();
        assert_eq!(count(&history), 2);
    }

    #[test]
    fn full_history_evicts_the_oldest() {
        let (history, clock) = setup();
        for i in 1..=30 {
            history.append(&format!("t{i}")).unwrap();
            clock.advance(Duration::seconds(1));
        }

        history.append("t31").unwrap();

        let latex: Vec<String> = history.list().unwrap().into_iter().map(|e| e.latex).collect();
        assert_eq!(latex.len(), 30);
        assert_eq!(latex.first().map(String::as_str), Some("t31"));
        assert_eq!(latex.last().map(String::as_str), Some("t2"));
        assert!(!latex.contains(&"t1".to_string()));
    }

    #[test]
    fn survivors_are_the_most_recent() {
        let (history, clock) = setup();
        for i in 0..40 {
            history.append(&format!("f{i}")).unwrap();
            clock.advance(Duration::milliseconds(500));
        }
        let expected: Vec<String> = (10..40).rev().map(|i| format!("f{i}")).collect();
        let latex: Vec<String> = history.list().unwrap().into_iter().map(|e| e.latex).collect();
        assert_eq!(latex, expected);
    }

    #[test]
    fn remove_deletes_single_entry() {
        let (history, clock) = setup();
        let a = history.append("a").unwrap().unwrap();
        clock.advance(Duration::seconds(1));
        history.append("b").unwrap();
        history.remove(a.id.unwrap()).unwrap();
        let remaining = history.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].latex, "b");
    }

    #[test]
    fn smaller_cap_is_respected() {
        let (history, clock) = setup();
        let history = history.with_cap(3);
        for i in 0..5 {
            history.append(&i.to_string()).unwrap();
            clock.advance(Duration::seconds(1));
        }
        assert_eq!(count(&history), 3);
    }
}
