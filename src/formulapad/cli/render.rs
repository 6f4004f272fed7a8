//! Terminal rendering. Functions build strings so they can be tested without
//! capturing stdout; `print_*` helpers write them out.

use chrono::{DateTime, Utc};
use colored::Colorize;
use formulapad::model::{Document, FormulaSnip, HistoryEntry, Note, Setting, SyncAction};
use formulapad::search::{SearchItem, SearchKind};
use formulapad::store::StorageUsage;
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;
const ID_WIDTH: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self::new(MessageLevel::Info, content)
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::new(MessageLevel::Success, content)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(MessageLevel::Warning, content)
    }

    fn new(level: MessageLevel, content: impl Into<String>) -> Self {
        Self {
            level,
            content: content.into(),
        }
    }
}

pub fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

/// One listing line: id, a text that gets truncated to fit, and a time.
struct Row<'a> {
    id: &'a str,
    text: String,
    at: DateTime<Utc>,
}

fn render_rows(rows: &[Row<'_>], now: DateTime<Utc>, empty: &str) -> String {
    if rows.is_empty() {
        return format!("{}\n", empty);
    }

    let mut out = String::new();
    for row in rows {
        let id = format!("{:<width$} ", row.id, width = ID_WIDTH);
        let available = LINE_WIDTH.saturating_sub(id.width() + TIME_WIDTH + 2);
        let text = truncate_to_width(&row.text.replace('\n', " "), available);
        let padding = available.saturating_sub(text.width());
        out.push_str(&format!(
            "  {}{}{}{}\n",
            id.yellow(),
            text,
            " ".repeat(padding),
            format_time_ago(row.at, now).dimmed()
        ));
    }
    out
}

pub fn render_snips(snips: &[FormulaSnip], now: DateTime<Utc>) -> String {
    let rows: Vec<Row> = snips
        .iter()
        .map(|s| Row {
            id: &s.id,
            text: format!("{}  {}", s.title, s.latex),
            at: s.created_at,
        })
        .collect();
    render_rows(&rows, now, "No snips found.")
}

pub fn render_notes(notes: &[Note], now: DateTime<Utc>) -> String {
    let rows: Vec<Row> = notes
        .iter()
        .map(|n| Row {
            id: &n.id,
            text: format!("{}  {}", n.title, n.content),
            at: n.updated_at,
        })
        .collect();
    render_rows(&rows, now, "No notes found.")
}

pub fn render_documents(documents: &[Document], now: DateTime<Utc>) -> String {
    let rows: Vec<Row> = documents
        .iter()
        .map(|d| Row {
            id: &d.id,
            text: format!(
                "{}  {} pages, {} [{}]",
                d.name,
                d.pages,
                d.size,
                d.status
            ),
            at: d.converted_at,
        })
        .collect();
    render_rows(&rows, now, "No documents found.")
}

pub fn render_note(note: &Note) -> String {
    let mut out = format!(
        "{}\n--------------------------------\n{}\n",
        note.title.bold(),
        note.content
    );
    let spans = note.math_spans();
    if !spans.is_empty() {
        out.push_str(&format!("\n{}\n", "Math:".dimmed()));
        for span in spans {
            let marker = if span.display { "$$" } else { "$" };
            out.push_str(&format!("  {marker} {}\n", span.latex));
        }
    }
    out
}

pub fn render_history(entries: &[HistoryEntry], now: DateTime<Utc>) -> String {
    let ids: Vec<String> = entries
        .iter()
        .map(|e| e.id.map(|id| id.to_string()).unwrap_or_default())
        .collect();
    let rows: Vec<Row> = entries
        .iter()
        .zip(&ids)
        .map(|(e, id)| Row {
            id,
            text: e.latex.clone(),
            at: DateTime::from_timestamp_millis(e.timestamp).unwrap_or_default(),
        })
        .collect();
    render_rows(&rows, now, "History is empty.")
}

pub fn render_search(items: &[SearchItem], now: DateTime<Utc>) -> String {
    let rows: Vec<Row> = items
        .iter()
        .map(|item| {
            let kind = match item.kind {
                SearchKind::Snip => "snip",
                SearchKind::Note => "note",
                SearchKind::Document => "doc",
            };
            Row {
                id: &item.id,
                text: format!("{:<5}{}  {}", kind, item.title, item.content),
                at: item.date,
            }
        })
        .collect();
    render_rows(&rows, now, "No matches.")
}

pub fn render_queue(actions: &[SyncAction]) -> String {
    if actions.is_empty() {
        return "Sync queue is empty.\n".to_string();
    }
    let mut out = String::new();
    for (i, action) in actions.iter().enumerate() {
        let at = action
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        out.push_str(&format!(
            "{:>3}. {:<16} {}  {}\n",
            i + 1,
            action.kind.to_string().yellow(),
            action.data,
            at.dimmed()
        ));
    }
    out
}

pub fn render_settings(settings: &[Setting]) -> String {
    if settings.is_empty() {
        return "No settings stored.\n".to_string();
    }
    settings
        .iter()
        .map(|s| format!("{} = {}\n", s.key, s.value))
        .collect()
}

pub fn render_usage(usage: &StorageUsage) -> String {
    match (usage.quota, usage.percent_used) {
        (Some(quota), Some(percent)) => format!(
            "{} of {} used ({:.2}%)\n",
            human_bytes(usage.usage),
            human_bytes(quota),
            percent
        ),
        _ => format!("{} used\n", human_bytes(usage.usage)),
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(at);
    let time_str = Formatter::new().convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use formulapad::model::SnipSource;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 11, 12, 0, 0).unwrap()
    }

    #[test]
    fn truncates_by_display_width() {
        assert_eq!(truncate_to_width("abcdef", 4), "abc…");
        assert_eq!(truncate_to_width("ab", 4), "ab");
        assert_eq!(truncate_to_width("日本語です", 5), "日本…");
    }

    #[test]
    fn snip_rows_show_id_and_latex() {
        let mut snip = FormulaSnip::new("Pythagoras", "a^2 + b^2 = c^2", SnipSource::Pdf);
        snip.id = "42".into();
        snip.created_at = now() - chrono::Duration::hours(2);
        let out = render_snips(&[snip], now());
        assert!(out.contains("42"));
        assert!(out.contains("a^2 + b^2 = c^2"));
        assert!(out.contains("2 hours ago"));
    }

    #[test]
    fn empty_listing_message() {
        assert_eq!(render_notes(&[], now()), "No notes found.\n");
    }

    #[test]
    fn note_view_lists_math() {
        let note = Note::new("Circle", "Area is $\\pi r^2$.");
        let out = render_note(&note);
        assert!(out.contains("$ \\pi r^2"));
    }

    #[test]
    fn usage_with_and_without_quota() {
        assert_eq!(render_usage(&StorageUsage::new(512, None)), "512 B used\n");
        assert_eq!(
            render_usage(&StorageUsage::new(2048, Some(4096))),
            "2.0 KB of 4.0 KB used (50.00%)\n"
        );
    }
}
