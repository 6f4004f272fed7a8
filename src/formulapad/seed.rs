//! Sample data loaded into empty partitions on first run.

use crate::model::{Document, FormulaSnip, Note};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use tracing::warn;

const SNIPS_JSON: &str = include_str!("seed/snips.json");
const NOTES_JSON: &str = include_str!("seed/notes.json");
const DOCUMENTS_JSON: &str = include_str!("seed/documents.json");

static SNIPS: Lazy<Vec<FormulaSnip>> = Lazy::new(|| parse("snips", SNIPS_JSON));
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| parse("notes", NOTES_JSON));
static DOCUMENTS: Lazy<Vec<Document>> = Lazy::new(|| parse("documents", DOCUMENTS_JSON));

fn parse<T: DeserializeOwned>(name: &str, text: &str) -> Vec<T> {
    serde_json::from_str(text).unwrap_or_else(|e| {
        warn!("Bundled {name} seed is unreadable: {e}");
        Vec::new()
    })
}

pub fn default_snips() -> &'static [FormulaSnip] {
    &SNIPS
}

pub fn default_notes() -> &'static [Note] {
    &NOTES
}

pub fn default_documents() -> &'static [Document] {
    &DOCUMENTS
}
