//! # FormulaPad Architecture
//!
//! FormulaPad is the offline persistence and undo/redo layer of a formula
//! capture tool: recognized formulas ("snips"), Markdown notes with embedded
//! math, converted documents, a formula history and settings. It is a
//! library first; the `formulapad` binary is one thin client over it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (cli/, wired by main.rs)                               │
//! │  - Parses arguments, renders output, owns stdout/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Facade (app.rs)                                            │
//! │  - Builds and owns every component around one Database      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Repositories, history, settings, sync queue, connectivity  │
//! │  - Optimistic in-memory state, best-effort persistence      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - Database adapter over a StorageBackend                   │
//! │  - FsBackend (production), MemBackend (testing)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Everything runs on one thread. Shared state uses `Rc`, `Cell` and
//! `RefCell`; every call finishes its I/O before returning.
//!
//! ## No I/O Assumptions in Core
//!
//! Nothing below the CLI prints, exits, or assumes a terminal. Failures that
//! must not interrupt the user (persistence of an optimistic mutation, history
//! writes, queue replays) are logged with `tracing` and reported as values.
//!
//! ## Module Overview
//!
//! - [`app`]: The facade and its lifecycle
//! - [`store`]: Storage backends and the `Database` adapter
//! - [`model`]: Persisted records and partitions
//! - [`repository`]: Snip, note and document repositories
//! - [`history`]: Capped, deduplicated formula history
//! - [`settings`]: Key/value preferences
//! - [`sync_queue`]: Offline action log and replay
//! - [`connectivity`]: Online/offline state machine
//! - [`snapshot`]: Undo/redo snapshot stack
//! - [`backup`]: JSON export and import
//! - [`search`]: Cross-partition text search
//! - [`recognition`]: Remote formula recognition with offline fallback
//! - [`config`]: Layered configuration
//! - [`clock`]: Injectable time source
//! - [`seed`]: Bundled sample content
//! - [`error`]: Error types

pub mod app;
pub mod backup;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod history;
pub mod model;
pub mod recognition;
pub mod repository;
pub mod search;
pub mod seed;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod sync_queue;
