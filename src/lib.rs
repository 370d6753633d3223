//! Core library for the choreboard household chore tracker.
//!
//! A shared board of recurring and one-time chores: household members mark
//! them done individually or jointly, and urgency is derived from elapsed
//! time since the last completion. The library owns the data model, the
//! status/priority engine, the completion merge protocol, and the
//! chore/category operations; persistence sits behind the [`DocumentStore`]
//! trait, with in-memory and SQLite implementations included. Rendering
//! and identity stay with the caller.

pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod service;
pub mod status;
pub mod store;

pub use db::SqliteStore;
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::{
    Category, CategoryDeleteSummary, CategoryUpdate, Chore, ChoreUpdate, Completion,
    CompletionUpdate, NewChore, UNCATEGORIZED, User, completer_names,
};
pub use service::{ChoreService, MERGE_WINDOW_SECONDS, MarkDoneOutcome, ServiceOptions};
pub use status::{
    Board, BoardColumn, ChoreStatus, ChoreWithStatus, DueSummary, NeverDonePolicy,
    SEVERE_OVERDUE_MULTIPLIER, compute_status, due_summary, sort_by_priority,
};
pub use store::{ChangeEvent, DocumentStore, Listener, Subscription, WriteOp};
