//! Storage module for scored comments
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts keyed by comment fingerprint
//! - Aggregate reads for the statistics report

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CommentStore, PostCount, StorageError, StorageResult};

use std::path::Path;

/// Opens or creates the comment store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Store ready for writes
/// * `Err(StorageError)` - The database could not be opened
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}
