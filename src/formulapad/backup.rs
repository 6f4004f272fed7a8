//! # Backup
//!
//! A backup is one JSON document holding the three content partitions:
//!
//! ```json
//! { "version": 1,
//!   "exportedAt": "2025-07-10T12:00:00Z",
//!   "data": { "snips": [...], "notes": [...], "documents": [...] } }
//! ```
//!
//! Import is all-or-nothing at the parsing stage: the envelope and every
//! record are validated before the first write. Writing is additive; records
//! overwrite existing ones with the same id and nothing is deleted.

use crate::clock::Clock;
use crate::error::{FormulaPadError, Result};
use crate::model::{Document, Entity, FormulaSnip, Note};
use crate::store::{Database, StorageBackend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default)]
    pub snips: Vec<FormulaSnip>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub data: BackupData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub snips: usize,
    pub notes: usize,
    pub documents: usize,
}

impl ImportCounts {
    pub fn total(&self) -> usize {
        self.snips + self.notes + self.documents
    }
}

/// Default file name for a backup taken at `at`.
pub fn file_name(at: DateTime<Utc>) -> String {
    format!("formulapad-backup-{}.json", at.format("%Y-%m-%d"))
}

pub fn export<B: StorageBackend>(db: &Database<B>, clock: &dyn Clock) -> Result<Backup> {
    Ok(Backup {
        version: BACKUP_VERSION,
        exported_at: clock.now(),
        data: BackupData {
            snips: db.get_all()?,
            notes: db.get_all()?,
            documents: db.get_all()?,
        },
    })
}

/// Parse and validate backup text without touching storage.
pub fn parse(text: &str) -> Result<Backup> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| FormulaPadError::Validation(format!("backup is not JSON: {e}")))?;

    match raw.get("version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(BACKUP_VERSION) => {}
        Some(v) => {
            return Err(FormulaPadError::Validation(format!(
                "unsupported backup version {v}"
            )))
        }
        None => return Err(FormulaPadError::Validation("backup has no version".into())),
    }

    let backup: Backup =
        serde_json::from_value(raw).map_err(|e| FormulaPadError::Validation(e.to_string()))?;

    check_ids("snips", &backup.data.snips)?;
    check_ids("notes", &backup.data.notes)?;
    check_ids("documents", &backup.data.documents)?;
    Ok(backup)
}

fn check_ids<T: Entity>(section: &str, records: &[T]) -> Result<()> {
    match records.iter().position(|r| r.id().is_empty()) {
        Some(i) => Err(FormulaPadError::Validation(format!(
            "{section}[{i}] has no id"
        ))),
        None => Ok(()),
    }
}

/// Write every record of an already validated backup.
pub fn import<B: StorageBackend>(db: &Database<B>, backup: &Backup) -> Result<ImportCounts> {
    for snip in &backup.data.snips {
        db.put(snip)?;
    }
    for note in &backup.data.notes {
        db.put(note)?;
    }
    for doc in &backup.data.documents {
        db.put(doc)?;
    }

    let counts = ImportCounts {
        snips: backup.data.snips.len(),
        notes: backup.data.notes.len(),
        documents: backup.data.documents.len(),
    };
    info!(
        snips = counts.snips,
        notes = counts.notes,
        documents = counts.documents,
        "backup imported"
    );
    Ok(counts)
}

pub fn write_file(backup: &Backup, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(backup)?;
    fs::write(path, text).map_err(FormulaPadError::Io)
}

pub fn read_file(path: &Path) -> Result<Backup> {
    let text = fs::read_to_string(path).map_err(FormulaPadError::Io)?;
    parse(&text)
}
