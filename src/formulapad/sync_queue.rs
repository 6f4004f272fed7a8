//! # Sync Queue
//!
//! Actions performed while offline are appended to a JSON list kept in a
//! string-keyed slot outside the database, so the list survives restarts.
//! When connectivity returns the whole list is replayed in order through a
//! [`SyncSink`] and then cleared.
//!
//! Draining is best-effort: the list is cleared once every action has been
//! attempted, whether or not each replay succeeded. Failures are counted in
//! the [`DrainReport`] and logged, never re-queued.

use crate::clock::Clock;
use crate::error::Result;
use crate::model::SyncAction;
use crate::store::{Database, SlotStorage, StorageBackend};
use std::rc::Rc;
use tracing::{info, warn};

pub const SYNC_QUEUE_KEY: &str = "formulapad_sync_queue";

/// The remote side actions are replayed against.
pub trait SyncSink {
    fn replay(&self, action: &SyncAction) -> Result<()>;
}

impl<F> SyncSink for F
where
    F: Fn(&SyncAction) -> Result<()>,
{
    fn replay(&self, action: &SyncAction) -> Result<()> {
        self(action)
    }
}

/// Sink used when no remote is configured: it only logs what would be sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl SyncSink for LoggingSink {
    fn replay(&self, action: &SyncAction) -> Result<()> {
        info!(kind = %action.kind, timestamp = ?action.timestamp, "syncing action");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub failed: usize,
}

pub struct SyncQueue<B: StorageBackend + SlotStorage> {
    db: Rc<Database<B>>,
    clock: Rc<dyn Clock>,
}

impl<B: StorageBackend + SlotStorage> SyncQueue<B> {
    pub fn new(db: Rc<Database<B>>, clock: Rc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn slots(&self) -> &B {
        self.db.backend()
    }

    fn write(&self, actions: &[SyncAction]) -> Result<()> {
        let json = serde_json::to_string(actions)?;
        self.slots().write_slot(SYNC_QUEUE_KEY, &json)
    }

    /// Append an action stamped with the current time.
    pub fn enqueue(&self, mut action: SyncAction) -> Result<SyncAction> {
        action.timestamp = Some(self.clock.now().timestamp_millis());
        let mut queue = self.peek()?;
        queue.push(action.clone());
        self.write(&queue)?;
        Ok(action)
    }

    /// The queued actions in insertion order. A corrupt slot reads as empty.
    pub fn peek(&self) -> Result<Vec<SyncAction>> {
        let raw = match self.slots().read_slot(SYNC_QUEUE_KEY)? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        match serde_json::from_str(&raw) {
            Ok(queue) => Ok(queue),
            Err(e) => {
                warn!("Discarding unreadable sync queue: {e}");
                Ok(Vec::new())
            }
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.peek()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.write(&[])
    }

    /// Replay every queued action in order, then clear the queue.
    pub fn drain(&self, sink: &dyn SyncSink) -> Result<DrainReport> {
        let queue = self.peek()?;
        let mut report = DrainReport::default();
        if queue.is_empty() {
            return Ok(report);
        }

        for action in &queue {
            report.attempted += 1;
            if let Err(e) = sink.replay(action) {
                report.failed += 1;
                warn!(kind = %action.kind, "Sync failed: {e}");
            }
        }

        self.clear()?;
        info!(
            attempted = report.attempted,
            failed = report.failed,
            "sync queue drained"
        );
        Ok(report)
    }
}
