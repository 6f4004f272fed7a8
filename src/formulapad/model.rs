//! # Data Model
//!
//! Every persisted entity implements [`Record`]: it knows the [`Partition`] it
//! lives in, the key it is stored under, and the timestamp used to rank it
//! (lists are always shown newest first).
//!
//! Field names are serialized in camelCase so the on-disk partitions and the
//! backup format share one shape.

use chrono::{DateTime, TimeZone, Utc};
use pulldown_cmark::{Event, Options, Parser};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::recognition::RecognitionResult;

/// Key of a stored record. Domain records use text ids, history entries use
/// auto-assigned integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(u64),
    Text(String),
}

impl RecordKey {
    /// Reads a key out of a raw JSON value. Only strings and unsigned integers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(RecordKey::Text(s.clone())),
            Value::Number(n) => n.as_u64().map(RecordKey::Int),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(n) => Value::from(*n),
            RecordKey::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(n) => write!(f, "{}", n),
            RecordKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::Text(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey::Text(s)
    }
}

impl From<u64> for RecordKey {
    fn from(n: u64) -> Self {
        RecordKey::Int(n)
    }
}

/// The named partitions of the database and their schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Snips,
    Notes,
    Documents,
    Settings,
    History,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Snips,
        Partition::Notes,
        Partition::Documents,
        Partition::Settings,
        Partition::History,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Partition::Snips => "snips",
            Partition::Notes => "notes",
            Partition::Documents => "documents",
            Partition::Settings => "settings",
            Partition::History => "history",
        }
    }

    /// Field holding the record key.
    pub fn key_path(&self) -> &'static str {
        match self {
            Partition::Settings => "key",
            _ => "id",
        }
    }

    /// Secondary index used for timestamp ordering, if any.
    pub fn index(&self) -> Option<&'static str> {
        match self {
            Partition::Snips => Some("createdAt"),
            Partition::Notes => Some("updatedAt"),
            Partition::Documents => Some("convertedAt"),
            Partition::Settings => None,
            Partition::History => Some("timestamp"),
        }
    }

    pub fn auto_increment(&self) -> bool {
        matches!(self, Partition::History)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value stored in one partition under a unique key.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const PARTITION: Partition;

    fn key(&self) -> RecordKey;

    /// Timestamp lists are sorted by (descending).
    fn ranking(&self) -> DateTime<Utc>;
}

/// Records owned by a domain repository: text ids assigned on add, and the
/// sync action tags used while offline.
pub trait Entity: Record {
    const ADD_ACTION: SyncActionKind;
    const DELETE_ACTION: SyncActionKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Called on add and update so entities can refresh their own timestamps.
    fn touch(&mut self, _now: DateTime<Utc>, _created: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnipSource {
    Screenshot,
    Handwriting,
    Pdf,
}

fn equation_tag() -> String {
    "equation".to_string()
}

/// A captured or recognized formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaSnip {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub latex: String,
    pub markdown: String,
    #[serde(rename = "type", default = "equation_tag")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub source: SnipSource,
    #[serde(default)]
    pub thumbnail: String,
}

impl FormulaSnip {
    pub fn new(title: impl Into<String>, latex: impl Into<String>, source: SnipSource) -> Self {
        let latex = latex.into();
        Self {
            id: String::new(),
            title: title.into(),
            markdown: format!("${}$", latex),
            latex,
            kind: equation_tag(),
            created_at: Utc::now(),
            source,
            thumbnail: String::new(),
        }
    }

    /// Builds the snip saved after a recognition run. `ordinal` numbers the
    /// default title ("Snip 7").
    pub fn from_recognition(
        result: &RecognitionResult,
        source: SnipSource,
        thumbnail: impl Into<String>,
        ordinal: usize,
    ) -> Self {
        let mut snip = Self::new(format!("Snip {}", ordinal), result.latex.clone(), source);
        snip.thumbnail = thumbnail.into();
        snip
    }
}

impl Record for FormulaSnip {
    const PARTITION: Partition = Partition::Snips;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.id.clone())
    }

    fn ranking(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for FormulaSnip {
    const ADD_ACTION: SyncActionKind = SyncActionKind::AddSnip;
    const DELETE_ACTION: SyncActionKind = SyncActionKind::DeleteSnip;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// A Markdown note. Content may embed `$...$` and `$$...$$` math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One math span found in note content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    pub display: bool,
    pub latex: String,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Inline (`$..$`) and display (`$$..$$`) math in document order.
    pub fn math_spans(&self) -> Vec<MathSpan> {
        let parser = Parser::new_ext(&self.content, Options::ENABLE_MATH);
        parser
            .filter_map(|event| match event {
                Event::InlineMath(tex) => Some(MathSpan {
                    display: false,
                    latex: tex.trim().to_string(),
                }),
                Event::DisplayMath(tex) => Some(MathSpan {
                    display: true,
                    latex: tex.trim().to_string(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl Record for Note {
    const PARTITION: Partition = Partition::Notes;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.id.clone())
    }

    fn ranking(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Note {
    const ADD_ACTION: SyncActionKind = SyncActionKind::AddNote;
    const DELETE_ACTION: SyncActionKind = SyncActionKind::DeleteNote;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn touch(&mut self, now: DateTime<Utc>, _created: bool) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Converted,
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Converted => "converted",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A converted (PDF) document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pages: u32,
    pub size: String,
    pub converted_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub preview: String,
}

impl Document {
    pub fn new(name: impl Into<String>, pages: u32, size: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            kind: "pdf".to_string(),
            pages,
            size: size.into(),
            converted_at: Utc::now(),
            status: DocumentStatus::Processing,
            preview: String::new(),
        }
    }
}

impl Record for Document {
    const PARTITION: Partition = Partition::Documents;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.id.clone())
    }

    fn ranking(&self) -> DateTime<Utc> {
        self.converted_at
    }
}

impl Entity for Document {
    const ADD_ACTION: SyncActionKind = SyncActionKind::AddDocument;
    const DELETE_ACTION: SyncActionKind = SyncActionKind::DeleteDocument;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// A recently produced formula. `id` is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub latex: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(latex: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            latex: latex.into(),
            timestamp: at.timestamp_millis(),
        }
    }
}

impl Record for HistoryEntry {
    const PARTITION: Partition = Partition::History;

    fn key(&self) -> RecordKey {
        RecordKey::Int(self.id.unwrap_or_default())
    }

    fn ranking(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_default()
    }
}

/// One settings record: a string key mapped to any JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: Value,
}

impl Record for Setting {
    const PARTITION: Partition = Partition::Settings;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.key.clone())
    }

    fn ranking(&self) -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncActionKind {
    AddSnip,
    DeleteSnip,
    AddNote,
    DeleteNote,
    AddDocument,
    DeleteDocument,
}

impl fmt::Display for SyncActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SyncActionKind::AddSnip => "ADD_SNIP",
            SyncActionKind::DeleteSnip => "DELETE_SNIP",
            SyncActionKind::AddNote => "ADD_NOTE",
            SyncActionKind::DeleteNote => "DELETE_NOTE",
            SyncActionKind::AddDocument => "ADD_DOCUMENT",
            SyncActionKind::DeleteDocument => "DELETE_DOCUMENT",
        };
        f.write_str(tag)
    }
}

/// An action recorded while offline, replayed when connectivity returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAction {
    #[serde(rename = "type")]
    pub kind: SyncActionKind,
    #[serde(default)]
    pub data: Value,
    /// Enqueue time in epoch milliseconds, stamped by the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SyncAction {
    pub fn new(kind: SyncActionKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snip_serializes_camel_case_with_type_tag() {
        let snip = FormulaSnip::new("Euler", "e^{i\\pi} + 1 = 0", SnipSource::Handwriting);
        let json = serde_json::to_value(&snip).unwrap();
        assert_eq!(json["type"], "equation");
        assert_eq!(json["source"], "handwriting");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["markdown"], "$e^{i\\pi} + 1 = 0$");
    }

    #[test]
    fn history_entry_omits_unassigned_id() {
        let entry = HistoryEntry::new("a^2", Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn record_key_reads_text_and_int() {
        assert_eq!(
            RecordKey::from_value(&Value::from("abc")),
            Some(RecordKey::Text("abc".into()))
        );
        assert_eq!(
            RecordKey::from_value(&Value::from(7u64)),
            Some(RecordKey::Int(7))
        );
        assert_eq!(RecordKey::from_value(&Value::from("")), None);
        assert_eq!(RecordKey::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn sync_action_uses_screaming_tags() {
        let action = SyncAction::new(SyncActionKind::DeleteSnip, serde_json::json!({"id": "1"}));
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"type\":\"DELETE_SNIP\""));
        assert_eq!(SyncActionKind::AddNote.to_string(), "ADD_NOTE");
    }

    #[test]
    fn note_math_spans_finds_inline_and_display() {
        let note = Note::new(
            "Complex",
            "A number $z$ is written as:\n\n$$z = a + bi$$\n\nwhere $a$ is real.",
        );
        let spans = note.math_spans();
        assert_eq!(spans.len(), 3);
        assert_eq!(
            spans[0],
            MathSpan {
                display: false,
                latex: "z".into()
            }
        );
        assert!(spans[1].display);
        assert_eq!(spans[1].latex, "z = a + bi");
        assert_eq!(spans[2].latex, "a");
    }

    #[test]
    fn partition_schema() {
        assert_eq!(Partition::Settings.key_path(), "key");
        assert_eq!(Partition::Notes.index(), Some("updatedAt"));
        assert!(Partition::History.auto_increment());
        assert_eq!(Partition::from_name("documents"), Some(Partition::Documents));
        assert_eq!(Partition::from_name("pads"), None);
    }
}
