//! # Application Facade
//!
//! [`FormulaPad`] is the single entry point for front ends. It owns one
//! explicitly constructed [`Database`] handle and shares it, through `Rc`,
//! with every component:
//!
//! ```text
//!                 ┌──────────── FormulaPad ────────────┐
//!                 │ snips  notes  documents  (Repository)
//!                 │ history  settings                   │
//!                 │ connectivity ──▶ sync queue         │
//!                 │ canvas (SnapshotHistory, no storage)│
//!                 └──────────────┬─────────────────────┘
//!                                ▼
//!                       Database<B: StorageBackend>
//! ```
//!
//! Generic over the backend: `FormulaPad<FsBackend>` in the CLI,
//! `FormulaPad<MemBackend>` in tests.
//!
//! ## Lifecycle
//!
//! `new` wires components without touching storage. `initialize` opens the
//! database and loads (or seeds) the content repositories. `close` releases
//! the handle; later storage calls fail until `initialize` runs again.

use crate::backup::{self, Backup, ImportCounts};
use crate::clock::Clock;
use crate::config::FormulaPadConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::Result;
use crate::history::{HistoryRepository, DEDUP_WINDOW_SECS, HISTORY_CAP};
use crate::model::{FormulaSnip, HistoryEntry, SnipSource};
use crate::recognition::RecognitionResult;
use crate::repository::{
    Applied, DocumentRepository, IdGenerator, NoteRepository, SnipRepository,
};
use crate::search::{self, SearchFilter, SearchItem};
use crate::seed;
use crate::settings::SettingsRepository;
use crate::snapshot::{SnapshotHistory, SNAPSHOT_CAP};
use crate::store::{Database, SlotStorage, StorageBackend, StorageUsage};
use crate::sync_queue::{DrainReport, SyncQueue, SyncSink};
use chrono::Duration;
use std::rc::Rc;
use tracing::{debug, warn};

/// Tunables taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppOptions {
    pub history_cap: usize,
    pub dedup_window: Duration,
    pub snapshot_cap: usize,
    pub storage_quota: Option<u64>,
    pub initial: Connectivity,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            history_cap: HISTORY_CAP,
            dedup_window: Duration::seconds(DEDUP_WINDOW_SECS),
            snapshot_cap: SNAPSHOT_CAP,
            storage_quota: None,
            initial: Connectivity::Online,
        }
    }
}

impl From<&FormulaPadConfig> for AppOptions {
    fn from(config: &FormulaPadConfig) -> Self {
        Self {
            history_cap: config.history_cap,
            dedup_window: Duration::seconds(config.dedup_window_secs),
            snapshot_cap: config.snapshot_cap,
            storage_quota: config.storage_quota,
            initial: Connectivity::from_online(!config.offline),
        }
    }
}

pub struct FormulaPad<B: StorageBackend + SlotStorage> {
    db: Rc<Database<B>>,
    clock: Rc<dyn Clock>,
    connectivity: Rc<ConnectivityMonitor<B>>,
    snips: SnipRepository<B>,
    notes: NoteRepository<B>,
    documents: DocumentRepository<B>,
    history: HistoryRepository<B>,
    settings: SettingsRepository<B>,
    canvas: SnapshotHistory<String>,
}

impl<B: StorageBackend + SlotStorage> FormulaPad<B> {
    pub fn new(
        backend: B,
        options: AppOptions,
        clock: Rc<dyn Clock>,
        sink: Box<dyn SyncSink>,
    ) -> Self {
        let db = Rc::new(Database::new(backend).with_quota(options.storage_quota));
        let queue = Rc::new(SyncQueue::new(db.clone(), clock.clone()));
        let connectivity = Rc::new(ConnectivityMonitor::new(options.initial, queue, sink));
        let ids = Rc::new(IdGenerator::new());

        Self {
            snips: SnipRepository::new(db.clone(), connectivity.clone(), clock.clone(), ids.clone()),
            notes: NoteRepository::new(db.clone(), connectivity.clone(), clock.clone(), ids.clone()),
            documents: DocumentRepository::new(db.clone(), connectivity.clone(), clock.clone(), ids),
            history: HistoryRepository::new(db.clone(), clock.clone())
                .with_cap(options.history_cap)
                .with_dedup_window(options.dedup_window),
            settings: SettingsRepository::new(db.clone()),
            canvas: SnapshotHistory::with_cap(options.snapshot_cap),
            db,
            clock,
            connectivity,
        }
    }

    /// Open storage and load the content repositories, seeding empty ones.
    pub fn initialize(&mut self) -> Result<()> {
        self.db.initialize()?;
        self.reload();
        Ok(())
    }

    pub fn close(&self) {
        self.db.close();
    }

    fn reload(&mut self) {
        self.snips.load_all(seed::default_snips());
        self.notes.load_all(seed::default_notes());
        self.documents.load_all(seed::default_documents());
        debug!(
            snips = self.snips.items().len(),
            notes = self.notes.items().len(),
            documents = self.documents.items().len(),
            "repositories loaded"
        );
    }

    pub fn database(&self) -> &Database<B> {
        &self.db
    }

    pub fn snips(&self) -> &SnipRepository<B> {
        &self.snips
    }

    pub fn snips_mut(&mut self) -> &mut SnipRepository<B> {
        &mut self.snips
    }

    pub fn notes(&self) -> &NoteRepository<B> {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut NoteRepository<B> {
        &mut self.notes
    }

    pub fn documents(&self) -> &DocumentRepository<B> {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut DocumentRepository<B> {
        &mut self.documents
    }

    pub fn history(&self) -> &HistoryRepository<B> {
        &self.history
    }

    pub fn settings(&self) -> &SettingsRepository<B> {
        &self.settings
    }

    pub fn canvas(&mut self) -> &mut SnapshotHistory<String> {
        &mut self.canvas
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor<B> {
        &self.connectivity
    }

    /// Push a connectivity event; returns the drain report when it brought
    /// the session back online.
    pub fn set_connectivity(&self, next: Connectivity) -> Option<DrainReport> {
        self.connectivity.set(next)
    }

    pub fn sync_queue(&self) -> &SyncQueue<B> {
        self.connectivity.queue()
    }

    /// Add a formula to history. History is a convenience: failures are
    /// logged and dropped.
    pub fn record_formula(&self, latex: &str) -> Option<HistoryEntry> {
        match self.history.append(latex) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to record formula history: {e}");
                None
            }
        }
    }

    /// Save a recognition result as a new snip and log it to history.
    pub fn capture(
        &mut self,
        result: &RecognitionResult,
        source: SnipSource,
        thumbnail: &str,
    ) -> Applied<FormulaSnip> {
        let ordinal = self.snips.items().len() + 1;
        let snip = FormulaSnip::from_recognition(result, source, thumbnail, ordinal);
        let applied = self.snips.add(snip);
        self.record_formula(&applied.value.latex);
        applied
    }

    pub fn export(&self) -> Result<Backup> {
        backup::export(&self.db, self.clock.as_ref())
    }

    /// Write a validated backup, then refresh the in-memory collections.
    pub fn import(&mut self, backup: &Backup) -> Result<ImportCounts> {
        let counts = backup::import(&self.db, backup)?;
        self.reload();
        Ok(counts)
    }

    pub fn search(&self, query: &str, filter: SearchFilter) -> Vec<SearchItem> {
        search::search(
            self.snips.items(),
            self.notes.items(),
            self.documents.items(),
            query,
            filter,
        )
    }

    pub fn usage(&self) -> Result<StorageUsage> {
        self.db.usage()
    }
}
