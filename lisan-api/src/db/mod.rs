//! Database queries, one module per resource
//!
//! All functions take the shared `SqlitePool` (or a transaction) and return
//! `lisan_common::Result`. Timestamps are bound explicitly as UTC.

pub mod categories;
pub mod exercises;
pub mod lessons;
pub mod levels;
pub mod progress;
pub mod users;
pub mod vocabularies;
