//! # CLI Layer
//!
//! One client of the library. This is the only code that parses arguments,
//! writes to stdout/stderr, installs the tracing subscriber or decides exit
//! codes.
//!
//! ## Structure
//!
//! - `run()`: loads configuration, builds the [`FormulaPad`] facade over an
//!   [`FsBackend`], dispatches, and closes the database.
//! - `handle_*()`: per-command handlers returning [`CmdMessage`]s.
//! - Rendering lives in `render.rs`.

use super::render::{
    print_messages, render_documents, render_history, render_note, render_notes, render_queue,
    render_search, render_settings, render_snips, render_usage, CmdMessage,
};
use super::setup::{
    Cli, Commands, ContentCommands, DataCommands, DocCommands, HistoryCommands, KindArg,
    MiscCommands, NoteCommands, QueueCommands, SnipCommands, SourceArg,
};
use chrono::Utc;
use clap::Parser;
use formulapad::app::{AppOptions, FormulaPad};
use formulapad::backup;
use formulapad::clock::SystemClock;
use formulapad::config::FormulaPadConfig;
use formulapad::connectivity::Connectivity;
use formulapad::error::{FormulaPadError, Result};
use formulapad::model::{Document, Entity, FormulaSnip, Note, Partition, RecordKey};
use formulapad::recognition::{
    image_payload, recognize_with_fallback, HttpRecognizer, MockRecognizer, Recognizer,
};
use formulapad::repository::{Applied, Repository};
use formulapad::store::fs_backend::FsBackend;
use formulapad::sync_queue::LoggingSink;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::Level;

struct AppContext {
    app: FormulaPad<FsBackend>,
    config: FormulaPadConfig,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = FormulaPadConfig::load(cli.config.as_deref())?;
    if cli.offline {
        config.offline = true;
    }

    // Config display does not need storage.
    if let Some(Commands::Misc(MiscCommands::Config { template })) = &cli.command {
        return handle_config(&config, *template);
    }

    let mut ctx = init_context(config)?;
    let result = dispatch(&mut ctx, cli.command);
    ctx.app.close();
    result
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn init_context(config: FormulaPadConfig) -> Result<AppContext> {
    let backend = FsBackend::new(config.data_dir()).with_db_name(&config.db_name);
    let mut app = FormulaPad::new(
        backend,
        AppOptions::from(&config),
        Rc::new(SystemClock),
        Box::new(LoggingSink),
    );
    app.initialize()?;
    Ok(AppContext { app, config })
}

fn dispatch(ctx: &mut AppContext, command: Option<Commands>) -> Result<()> {
    let messages = match command {
        Some(Commands::Content(cmd)) => match cmd {
            ContentCommands::Snips(cmd) => handle_snips(ctx, cmd)?,
            ContentCommands::Notes(cmd) => handle_notes(ctx, cmd)?,
            ContentCommands::Docs(cmd) => handle_docs(ctx, cmd)?,
            ContentCommands::Recognize {
                image,
                source,
                mock,
            } => handle_recognize(ctx, &image, source, mock)?,
            ContentCommands::Search { query, only } => {
                let items = ctx.app.search(&query.join(" "), KindArg::filter(only));
                print!("{}", render_search(&items, Utc::now()));
                Vec::new()
            }
            ContentCommands::History(cmd) => handle_history(ctx, cmd)?,
        },
        Some(Commands::Data(cmd)) => match cmd {
            DataCommands::Export { path } => handle_export(ctx, path)?,
            DataCommands::Import { path } => handle_import(ctx, &path)?,
            DataCommands::Queue(cmd) => handle_queue(ctx, cmd)?,
            DataCommands::Usage => {
                print!("{}", render_usage(&ctx.app.usage()?));
                Vec::new()
            }
        },
        Some(Commands::Misc(cmd)) => match cmd {
            MiscCommands::Settings { key, value, unset } => {
                handle_settings(ctx, key, value, unset)?
            }
            MiscCommands::Config { template } => {
                handle_config(&ctx.config, template)?;
                Vec::new()
            }
        },
        None => {
            print!("{}", render_snips(ctx.app.snips().items(), Utc::now()));
            Vec::new()
        }
    };
    print_messages(&messages);
    Ok(())
}

fn parse_fields(fields: &str) -> Result<Value> {
    serde_json::from_str(fields)
        .map_err(|e| FormulaPadError::Validation(format!("fields must be JSON: {e}")))
}

fn write_messages<T>(ctx: &AppContext, what: &str, applied: &Applied<T>) -> Vec<CmdMessage> {
    let mut messages = vec![CmdMessage::success(what.to_string())];
    if !applied.persisted {
        messages.push(CmdMessage::warning(
            "Kept in memory only: the write did not reach storage.",
        ));
    }
    if !ctx.app.connectivity().is_online() {
        messages.push(CmdMessage::info("Offline: change queued for sync."));
    }
    messages
}

fn handle_snips(ctx: &mut AppContext, cmd: SnipCommands) -> Result<Vec<CmdMessage>> {
    match cmd {
        SnipCommands::List => {
            print!("{}", render_snips(ctx.app.snips().items(), Utc::now()));
            Ok(Vec::new())
        }
        SnipCommands::Add {
            title,
            latex,
            source,
        } => {
            let applied = ctx
                .app
                .snips_mut()
                .add(FormulaSnip::new(title, latex, source.into()));
            ctx.app.record_formula(&applied.value.latex);
            let what = format!("Added snip {}.", applied.value.id);
            Ok(write_messages(ctx, &what, &applied))
        }
        SnipCommands::Remove { id } => entity_remove(ctx, &id, |app| app.snips_mut()),
        SnipCommands::Update { id, fields } => {
            entity_update(ctx, &id, &fields, |app| app.snips_mut())
        }
    }
}

fn handle_notes(ctx: &mut AppContext, cmd: NoteCommands) -> Result<Vec<CmdMessage>> {
    match cmd {
        NoteCommands::List => {
            print!("{}", render_notes(ctx.app.notes().items(), Utc::now()));
            Ok(Vec::new())
        }
        NoteCommands::Show { id } => match ctx.app.notes().find(&id) {
            Some(note) => {
                print!("{}", render_note(note));
                Ok(Vec::new())
            }
            None => Err(FormulaPadError::NotFound {
                partition: Partition::Notes.name(),
                key: RecordKey::from(id),
            }),
        },
        NoteCommands::Add { title, content } => {
            let applied = ctx.app.notes_mut().add(Note::new(title, content));
            let what = format!("Added note {}.", applied.value.id);
            Ok(write_messages(ctx, &what, &applied))
        }
        NoteCommands::Remove { id } => entity_remove(ctx, &id, |app| app.notes_mut()),
        NoteCommands::Update { id, fields } => {
            entity_update(ctx, &id, &fields, |app| app.notes_mut())
        }
    }
}

fn handle_docs(ctx: &mut AppContext, cmd: DocCommands) -> Result<Vec<CmdMessage>> {
    match cmd {
        DocCommands::List => {
            print!("{}", render_documents(ctx.app.documents().items(), Utc::now()));
            Ok(Vec::new())
        }
        DocCommands::Add { name, pages, size } => {
            let applied = ctx.app.documents_mut().add(Document::new(name, pages, size));
            let what = format!("Added document {}.", applied.value.id);
            Ok(write_messages(ctx, &what, &applied))
        }
        DocCommands::Remove { id } => entity_remove(ctx, &id, |app| app.documents_mut()),
        DocCommands::Update { id, fields } => {
            entity_update(ctx, &id, &fields, |app| app.documents_mut())
        }
    }
}

fn entity_remove<T: Entity>(
    ctx: &mut AppContext,
    id: &str,
    pick: impl FnOnce(&mut FormulaPad<FsBackend>) -> &mut Repository<T, FsBackend>,
) -> Result<Vec<CmdMessage>> {
    let applied = pick(&mut ctx.app).remove(id);
    if applied.value.is_none() {
        return Err(FormulaPadError::NotFound {
            partition: T::PARTITION.name(),
            key: RecordKey::from(id),
        });
    }
    Ok(write_messages(ctx, &format!("Removed {}.", id), &applied))
}

fn entity_update<T: Entity>(
    ctx: &mut AppContext,
    id: &str,
    fields: &str,
    pick: impl FnOnce(&mut FormulaPad<FsBackend>) -> &mut Repository<T, FsBackend>,
) -> Result<Vec<CmdMessage>> {
    let patch = parse_fields(fields)?;
    match pick(&mut ctx.app).update(id, &patch)? {
        Some(applied) => Ok(write_messages(ctx, &format!("Updated {}.", id), &applied)),
        None => Err(FormulaPadError::NotFound {
            partition: T::PARTITION.name(),
            key: RecordKey::from(id),
        }),
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn handle_recognize(
    ctx: &mut AppContext,
    image: &Path,
    source: SourceArg,
    mock: bool,
) -> Result<Vec<CmdMessage>> {
    let bytes = fs::read(image).map_err(FormulaPadError::Io)?;
    let payload = image_payload(&bytes, mime_for(image));

    let fallback = MockRecognizer::default();
    let primary: Box<dyn Recognizer> = if mock {
        Box::new(MockRecognizer::default())
    } else {
        Box::new(HttpRecognizer::new(&ctx.config.recognition_url)?)
    };

    let online = ctx.app.connectivity().is_online();
    let outcome = recognize_with_fallback(online, primary.as_ref(), &fallback, &payload)?;
    let applied = ctx.app.capture(&outcome.result, source.into(), &payload);

    let what = format!(
        "Saved {} ({}): {}  [{:.0}% confidence]",
        applied.value.title,
        applied.value.id,
        applied.value.latex,
        outcome.result.confidence * 100.0
    );
    let mut messages = write_messages(ctx, &what, &applied);
    if outcome.simulated {
        messages.push(CmdMessage::warning(
            "Recognition service unreachable: saved a simulated result.",
        ));
    }
    Ok(messages)
}

fn handle_history(ctx: &mut AppContext, cmd: HistoryCommands) -> Result<Vec<CmdMessage>> {
    match cmd {
        HistoryCommands::List => {
            print!("{}", render_history(&ctx.app.history().list()?, Utc::now()));
            Ok(Vec::new())
        }
        HistoryCommands::Add { latex } => Ok(match ctx.app.history().append(&latex)? {
            Some(entry) => vec![CmdMessage::success(format!(
                "Recorded as entry {}.",
                entry.id.unwrap_or_default()
            ))],
            None => vec![CmdMessage::info("Already recorded in the last minute.")],
        }),
        HistoryCommands::Remove { id } => {
            ctx.app.history().remove(id)?;
            Ok(vec![CmdMessage::success(format!("Removed entry {}.", id))])
        }
    }
}

fn handle_export(ctx: &mut AppContext, path: Option<PathBuf>) -> Result<Vec<CmdMessage>> {
    let snapshot = ctx.app.export()?;
    let path = path.unwrap_or_else(|| PathBuf::from(backup::file_name(snapshot.exported_at)));
    backup::write_file(&snapshot, &path)?;
    Ok(vec![CmdMessage::success(format!(
        "Exported {} snips, {} notes, {} documents to {}",
        snapshot.data.snips.len(),
        snapshot.data.notes.len(),
        snapshot.data.documents.len(),
        path.display()
    ))])
}

fn handle_import(ctx: &mut AppContext, path: &Path) -> Result<Vec<CmdMessage>> {
    let parsed = backup::read_file(path)?;
    let counts = ctx.app.import(&parsed)?;
    Ok(vec![CmdMessage::success(format!(
        "Imported {} snips, {} notes, {} documents.",
        counts.snips, counts.notes, counts.documents
    ))])
}

fn handle_queue(ctx: &mut AppContext, cmd: QueueCommands) -> Result<Vec<CmdMessage>> {
    match cmd {
        QueueCommands::Show => {
            print!("{}", render_queue(&ctx.app.sync_queue().peek()?));
            Ok(Vec::new())
        }
        QueueCommands::Sync => {
            ctx.app.set_connectivity(Connectivity::Offline);
            Ok(match ctx.app.set_connectivity(Connectivity::Online) {
                Some(report) if report.attempted == 0 => {
                    vec![CmdMessage::info("Nothing to sync.")]
                }
                Some(report) => {
                    let mut messages = vec![CmdMessage::success(format!(
                        "Replayed {} action(s).",
                        report.attempted
                    ))];
                    if report.failed > 0 {
                        messages.push(CmdMessage::warning(format!(
                            "{} action(s) failed and were dropped.",
                            report.failed
                        )));
                    }
                    messages
                }
                None => vec![CmdMessage::warning("Sync queue could not be drained.")],
            })
        }
    }
}

fn handle_settings(
    ctx: &mut AppContext,
    key: Option<String>,
    value: Option<String>,
    unset: bool,
) -> Result<Vec<CmdMessage>> {
    let settings = ctx.app.settings();
    match (key, value) {
        (None, _) => {
            print!("{}", render_settings(&settings.list()?));
            Ok(Vec::new())
        }
        (Some(key), _) if unset => {
            settings.remove(&key)?;
            Ok(vec![CmdMessage::success(format!("Removed {}.", key))])
        }
        (Some(key), None) => match settings.get_value(&key)? {
            Some(value) => {
                println!("{} = {}", key, value);
                Ok(Vec::new())
            }
            None => Ok(vec![CmdMessage::info(format!("{} is not set.", key))]),
        },
        (Some(key), Some(raw)) => {
            let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            let stored = settings.set(&key, &value)?;
            Ok(vec![CmdMessage::success(format!(
                "{} = {}",
                stored.key, stored.value
            ))])
        }
    }
}

fn handle_config(config: &FormulaPadConfig, template: bool) -> Result<()> {
    if template {
        print!("{}", FormulaPadConfig::template());
        return Ok(());
    }
    println!("data_dir = {}", config.data_dir().display());
    println!("db_name = {}", config.db_name);
    println!("history_cap = {}", config.history_cap);
    println!("dedup_window_secs = {}", config.dedup_window_secs);
    println!("snapshot_cap = {}", config.snapshot_cap);
    match config.storage_quota {
        Some(quota) => println!("storage_quota = {}", quota),
        None => println!("storage_quota = (unset)"),
    }
    println!("recognition_url = {}", config.recognition_url);
    println!("offline = {}", config.offline);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn fields_must_be_json() {
        assert!(parse_fields("{\"title\": \"x\"}").is_ok());
        assert!(matches!(
            parse_fields("title=x"),
            Err(FormulaPadError::Validation(_))
        ));
    }
}
