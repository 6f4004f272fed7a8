//! # Connectivity Monitor
//!
//! Single source of truth for online/offline state within a session.
//!
//! ```text
//!            went_offline()
//!   ONLINE ─────────────────▶ OFFLINE
//!     ▲                          │
//!     └──────────────────────────┘
//!        went_online() → drain()
//! ```
//!
//! The initial state comes from a [`ConnectivityProbe`]. After that the
//! monitor never polls: the runtime pushes transitions through [`set`].
//! Every transition notifies observers; only `OFFLINE → ONLINE` drains the
//! sync queue, exactly once per transition.
//!
//! [`set`]: ConnectivityMonitor::set

use crate::store::{SlotStorage, StorageBackend};
use crate::sync_queue::{DrainReport, SyncQueue, SyncSink};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// The runtime's current connectivity signal.
pub trait ConnectivityProbe {
    fn is_online(&self) -> bool;
}

/// A probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl ConnectivityProbe for StaticProbe {
    fn is_online(&self) -> bool {
        self.0
    }
}

type Observer = Box<dyn Fn(Connectivity)>;

pub struct ConnectivityMonitor<B: StorageBackend + SlotStorage> {
    state: Cell<Connectivity>,
    queue: Rc<SyncQueue<B>>,
    sink: Box<dyn SyncSink>,
    observers: RefCell<Vec<Observer>>,
}

impl<B: StorageBackend + SlotStorage> ConnectivityMonitor<B> {
    pub fn new(initial: Connectivity, queue: Rc<SyncQueue<B>>, sink: Box<dyn SyncSink>) -> Self {
        Self {
            state: Cell::new(initial),
            queue,
            sink,
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn from_probe(
        probe: &dyn ConnectivityProbe,
        queue: Rc<SyncQueue<B>>,
        sink: Box<dyn SyncSink>,
    ) -> Self {
        Self::new(Connectivity::from_online(probe.is_online()), queue, sink)
    }

    pub fn state(&self) -> Connectivity {
        self.state.get()
    }

    pub fn is_online(&self) -> bool {
        self.state.get() == Connectivity::Online
    }

    pub fn queue(&self) -> &SyncQueue<B> {
        &self.queue
    }

    /// Register a callback run on every transition.
    /// Observers must not subscribe from inside a callback.
    pub fn subscribe(&self, observer: impl Fn(Connectivity) + 'static) {
        self.observers.borrow_mut().push(Box::new(observer));
    }

    /// Apply a connectivity event. Returns the drain report when the event
    /// brought the session back online. Repeated events for the current state
    /// are ignored.
    pub fn set(&self, next: Connectivity) -> Option<DrainReport> {
        let previous = self.state.replace(next);
        if previous == next {
            return None;
        }

        info!(from = %previous, to = %next, "connectivity changed");
        for observer in self.observers.borrow().iter() {
            observer(next);
        }

        if next == Connectivity::Online {
            return match self.queue.drain(self.sink.as_ref()) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Failed to drain sync queue: {e}");
                    None
                }
            };
        }
        None
    }

    pub fn went_online(&self) -> Option<DrainReport> {
        self.set(Connectivity::Online)
    }

    pub fn went_offline(&self) {
        self.set(Connectivity::Offline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::Result;
    use crate::model::{SyncAction, SyncActionKind};
    use crate::store::mem_backend::MemBackend;
    use crate::store::Database;
    use serde_json::json;

    struct CountingSink(Rc<Cell<usize>>);

    impl SyncSink for CountingSink {
        fn replay(&self, _action: &SyncAction) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn setup(initial: Connectivity) -> (ConnectivityMonitor<MemBackend>, Rc<Cell<usize>>) {
        let db = Rc::new(Database::new(MemBackend::new()));
        db.initialize().unwrap();
        let queue = Rc::new(SyncQueue::new(db, Rc::new(SystemClock)));
        let replays = Rc::new(Cell::new(0));
        let monitor =
            ConnectivityMonitor::new(initial, queue, Box::new(CountingSink(replays.clone())));
        (monitor, replays)
    }

    #[test]
    fn initial_state_comes_from_probe() {
        let db = Rc::new(Database::new(MemBackend::new()));
        let queue = Rc::new(SyncQueue::new(db, Rc::new(SystemClock)));
        let monitor =
            ConnectivityMonitor::from_probe(&StaticProbe(false), queue, Box::new(crate::sync_queue::LoggingSink));
        assert_eq!(monitor.state(), Connectivity::Offline);
    }

    #[test]
    fn going_online_drains_once() {
        let (monitor, replays) = setup(Connectivity::Offline);
        monitor
            .queue()
            .enqueue(SyncAction::new(SyncActionKind::AddSnip, json!({"id": "1"})))
            .unwrap();
        monitor
            .queue()
            .enqueue(SyncAction::new(SyncActionKind::AddSnip, json!({"id": "2"})))
            .unwrap();

        let report = monitor.went_online().unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(replays.get(), 2);
        assert!(monitor.queue().is_empty().unwrap());

        // Already online: no second drain.
        assert!(monitor.went_online().is_none());
        assert_eq!(replays.get(), 2);
    }

    #[test]
    fn going_offline_only_notifies() {
        let (monitor, replays) = setup(Connectivity::Online);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        monitor.subscribe(move |state| sink.borrow_mut().push(state));

        monitor.went_offline();
        monitor.went_offline();
        monitor.went_online();

        assert_eq!(
            *seen.borrow(),
            vec![Connectivity::Offline, Connectivity::Online]
        );
        assert_eq!(replays.get(), 0);
    }
}
