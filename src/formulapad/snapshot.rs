//! Bounded, linear undo/redo over whole-state snapshots of the drawing
//! surface. Snapshots are opaque (typically an encoded image); nothing is
//! diffed.

use std::collections::VecDeque;

pub const SNAPSHOT_CAP: usize = 20;

#[derive(Debug, Clone)]
pub struct SnapshotHistory<S> {
    entries: VecDeque<S>,
    cursor: Option<usize>,
    cap: usize,
}

impl<S> Default for SnapshotHistory<S> {
    fn default() -> Self {
        Self::with_cap(SNAPSHOT_CAP)
    }
}

impl<S> SnapshotHistory<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cap of zero is treated as one.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            cap: cap.max(1),
        }
    }

    /// Record a new state: drops anything redoable, appends, and evicts the
    /// oldest snapshot once over the cap. The cursor ends on the new state.
    pub fn record(&mut self, snapshot: S) {
        match self.cursor {
            Some(cursor) => self.entries.truncate(cursor + 1),
            None => self.entries.clear(),
        }
        self.entries.push_back(snapshot);
        if self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> Option<&S> {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                self.entries.get(cursor - 1)
            }
            _ => None,
        }
    }

    pub fn redo(&mut self) -> Option<&S> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                self.entries.get(cursor + 1)
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&S> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
