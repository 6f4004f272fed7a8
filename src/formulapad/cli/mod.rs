//! # CLI Behavior
//!
//! One client of the library, and the only place that knows about terminal
//! I/O, exit codes and output formatting.
//!
//! ## Naked Execution
//!
//! Running `formulapad` with no arguments lists snips.
//!
//! ## Offline Sessions
//!
//! `--offline` (or `offline = true` in the config) starts the session offline:
//! every add and remove is also written to the sync queue. `formulapad queue
//! sync` brings the session online, which replays and clears the queue.
//!
//! ## Logging
//!
//! Library diagnostics go to stderr through `tracing`. Warnings are shown by
//! default; `-v` adds info and `-vv` debug.

mod commands;
mod render;
pub mod setup;

pub use commands::run;
