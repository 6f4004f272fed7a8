use clap::{Parser, Subcommand, ValueEnum};
use formulapad::model::SnipSource;
use formulapad::search::SearchFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "formulapad", bin_name = "formulapad", version)]
#[command(about = "Offline store for recognized formulas, notes and documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Start the session offline (mutations are queued for sync)
    #[arg(long, global = true, help_heading = "Options")]
    pub offline: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help_heading = "Options")]
    pub verbose: u8,

    /// Path to a formulapad.toml to use instead of the default
    #[arg(long, global = true, value_name = "FILE", help_heading = "Options")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Content(ContentCommands),

    #[command(flatten)]
    Data(DataCommands),

    #[command(flatten)]
    Misc(MiscCommands),
}

#[derive(Subcommand, Debug)]
pub enum ContentCommands {
    /// Work with formula snips
    #[command(subcommand)]
    Snips(SnipCommands),

    /// Work with notes
    #[command(subcommand)]
    Notes(NoteCommands),

    /// Work with converted documents
    #[command(subcommand)]
    Docs(DocCommands),

    /// Recognize a formula image and save it as a snip
    #[command(display_order = 4)]
    Recognize {
        /// Image file to send
        image: PathBuf,

        /// Where the image came from
        #[arg(long, value_enum, default_value_t = SourceArg::Screenshot)]
        source: SourceArg,

        /// Use the canned recognizer instead of the remote endpoint
        #[arg(long)]
        mock: bool,
    },

    /// Search snips, notes and documents
    #[command(display_order = 5)]
    Search {
        /// Search words (joined with spaces; empty lists everything)
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,

        /// Restrict to one kind of record
        #[arg(long, value_enum)]
        only: Option<KindArg>,
    },

    /// Recently produced formulas
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Subcommand, Debug)]
pub enum SnipCommands {
    /// List snips, newest first
    #[command(alias = "ls")]
    List,

    /// Add a snip
    Add {
        title: String,
        latex: String,

        #[arg(long, value_enum, default_value_t = SourceArg::Screenshot)]
        source: SourceArg,
    },

    /// Remove a snip by id
    #[command(alias = "rm")]
    Remove { id: String },

    /// Merge JSON fields into a snip (e.g. '{"title": "Gauss"}')
    Update { id: String, fields: String },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// List notes, most recently updated first
    #[command(alias = "ls")]
    List,

    /// Show a note and the math it contains
    Show { id: String },

    /// Add a note
    Add { title: String, content: String },

    /// Remove a note by id
    #[command(alias = "rm")]
    Remove { id: String },

    /// Merge JSON fields into a note
    Update { id: String, fields: String },
}

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// List documents, most recently converted first
    #[command(alias = "ls")]
    List,

    /// Register a document for conversion
    Add {
        name: String,

        #[arg(long, default_value_t = 1)]
        pages: u32,

        #[arg(long, default_value = "0 KB")]
        size: String,
    },

    /// Remove a document by id
    #[command(alias = "rm")]
    Remove { id: String },

    /// Merge JSON fields into a document (e.g. '{"status": "converted"}')
    Update { id: String, fields: String },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List history, newest first
    #[command(alias = "ls")]
    List,

    /// Record a formula
    Add { latex: String },

    /// Remove an entry by id
    #[command(alias = "rm")]
    Remove { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Write a JSON backup of snips, notes and documents
    #[command(display_order = 20)]
    Export {
        /// Output file (defaults to formulapad-backup-<date>.json)
        path: Option<PathBuf>,
    },

    /// Restore records from a JSON backup
    #[command(display_order = 21)]
    Import { path: PathBuf },

    /// Inspect or replay actions queued while offline
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Show storage usage
    #[command(display_order = 23)]
    Usage,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show pending actions
    Show,

    /// Reconnect and replay pending actions
    Sync,
}

#[derive(Subcommand, Debug)]
pub enum MiscCommands {
    /// Get or set a preference
    #[command(display_order = 30)]
    Settings {
        /// Preference key (omit to list all)
        key: Option<String>,

        /// JSON value to store (bare words are stored as strings)
        value: Option<String>,

        /// Remove the key instead
        #[arg(long, conflicts_with = "value")]
        unset: bool,
    },

    /// Show resolved configuration
    #[command(display_order = 31)]
    Config {
        /// Print a sample formulapad.toml instead
        #[arg(long)]
        template: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Screenshot,
    Handwriting,
    Pdf,
}

impl From<SourceArg> for SnipSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Screenshot => SnipSource::Screenshot,
            SourceArg::Handwriting => SnipSource::Handwriting,
            SourceArg::Pdf => SnipSource::Pdf,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Snips,
    Notes,
    Docs,
}

impl KindArg {
    pub fn filter(only: Option<KindArg>) -> SearchFilter {
        match only {
            None => SearchFilter::default(),
            Some(kind) => SearchFilter {
                snips: kind == KindArg::Snips,
                notes: kind == KindArg::Notes,
                documents: kind == KindArg::Docs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_snip_add() {
        let cli = Cli::try_parse_from([
            "formulapad", "--offline", "snips", "add", "Euler", "e^{i\\pi}", "--source", "pdf",
        ])
        .unwrap();
        assert!(cli.offline);
        match cli.command {
            Some(Commands::Content(ContentCommands::Snips(SnipCommands::Add { source, .. }))) => {
                assert_eq!(source, SourceArg::Pdf)
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn search_joins_words() {
        let cli = Cli::try_parse_from(["formulapad", "search", "linear", "algebra"]).unwrap();
        match cli.command {
            Some(Commands::Content(ContentCommands::Search { query, only })) => {
                assert_eq!(query.join(" "), "linear algebra");
                assert!(only.is_none());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn only_narrows_filter() {
        let filter = KindArg::filter(Some(KindArg::Notes));
        assert!(filter.notes && !filter.snips && !filter.documents);
    }

    #[test]
    fn verbose_counts() {
        let cli = Cli::try_parse_from(["formulapad", "-vv", "usage"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
