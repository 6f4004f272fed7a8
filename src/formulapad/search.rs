//! Cross-partition text search over snips, notes and documents.
//!
//! Each record becomes a [`SearchItem`] with a title and a content excerpt:
//!
//! | kind     | title  | content                         | date          |
//! |----------|--------|---------------------------------|---------------|
//! | snip     | title  | latex                           | `createdAt`   |
//! | note     | title  | first 200 chars of the Markdown | `updatedAt`   |
//! | document | name   | preview                         | `convertedAt` |
//!
//! Matching is a case-insensitive substring test on title or content. A blank
//! query matches everything. Results are newest first.

use crate::model::{Document, FormulaSnip, Note};
use chrono::{DateTime, Utc};
use std::fmt;

const NOTE_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Snip,
    Note,
    Document,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SearchKind::Snip => "snip",
            SearchKind::Note => "note",
            SearchKind::Document => "document",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    pub id: String,
    pub kind: SearchKind,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

/// Which partitions take part in a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFilter {
    pub snips: bool,
    pub notes: bool,
    pub documents: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            snips: true,
            notes: true,
            documents: true,
        }
    }
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(NOTE_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl From<&FormulaSnip> for SearchItem {
    fn from(snip: &FormulaSnip) -> Self {
        Self {
            id: snip.id.clone(),
            kind: SearchKind::Snip,
            title: snip.title.clone(),
            content: snip.latex.clone(),
            date: snip.created_at,
        }
    }
}

impl From<&Note> for SearchItem {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            kind: SearchKind::Note,
            title: note.title.clone(),
            content: excerpt(&note.content),
            date: note.updated_at,
        }
    }
}

impl From<&Document> for SearchItem {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            kind: SearchKind::Document,
            title: doc.name.clone(),
            content: doc.preview.clone(),
            date: doc.converted_at,
        }
    }
}

pub fn search(
    snips: &[FormulaSnip],
    notes: &[Note],
    documents: &[Document],
    query: &str,
    filter: SearchFilter,
) -> Vec<SearchItem> {
    let mut items: Vec<SearchItem> = Vec::new();
    if filter.snips {
        items.extend(snips.iter().map(SearchItem::from));
    }
    if filter.notes {
        items.extend(notes.iter().map(SearchItem::from));
    }
    if filter.documents {
        items.extend(documents.iter().map(SearchItem::from));
    }

    let query = query.trim().to_lowercase();
    if !query.is_empty() {
        items.retain(|item| {
            item.title.to_lowercase().contains(&query)
                || item.content.to_lowercase().contains(&query)
        });
    }

    items.sort_by(|a, b| b.date.cmp(&a.date));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{default_documents, default_notes, default_snips};

    fn run(query: &str, filter: SearchFilter) -> Vec<SearchItem> {
        search(
            default_snips(),
            default_notes(),
            default_documents(),
            query,
            filter,
        )
    }

    #[test]
    fn blank_query_returns_everything_newest_first() {
        let items = run("  ", SearchFilter::default());
        assert_eq!(items.len(), 13);
        assert!(items.windows(2).all(|w| w[0].date >= w[1].date));
        assert_eq!(items[0].id, "note1");
    }

    #[test]
    fn matches_title_case_insensitively() {
        let items = run("EULER", SearchFilter::default());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, SearchKind::Snip);
        assert_eq!(items[1].id, "note2");
    }

    #[test]
    fn matches_latex_content() {
        let items = run("\\det", SearchFilter::default());
        assert_eq!(items[0].title, "Matrix Determinant");
    }

    #[test]
    fn matches_document_preview() {
        let items = run("vector spaces", SearchFilter::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, SearchKind::Document);
    }

    #[test]
    fn filter_excludes_partitions() {
        let filter = SearchFilter {
            snips: false,
            notes: true,
            documents: false,
        };
        let items = run("", filter);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.kind == SearchKind::Note));
    }

    #[test]
    fn note_excerpt_is_truncated() {
        let mut note = Note::new("Long", "x".repeat(500));
        note.id = "n".into();
        let item = SearchItem::from(&note);
        assert_eq!(item.content.chars().count(), NOTE_EXCERPT_CHARS + 3);
        assert!(item.content.ends_with("..."));
    }

    #[test]
    fn short_note_is_not_marked() {
        let note = Note::new("Short", "$a$");
        assert_eq!(SearchItem::from(&note).content, "$a$");
    }
}
