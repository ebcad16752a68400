//! Storage Backends
//!
//! The storage contract used by sessions, the SQLite driver implementing it
//! and a statement-recording decorator.

pub mod core;
pub mod recording;
pub mod sqlite;

// Re-export core traits and types
pub use core::*;
pub use recording::{RecordingStorage, StatementKind, StatementLog};
pub use sqlite::SqliteStorage;
