//! Storage traits and error types

use crate::comment::ScoredComment;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Comment count for one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCount {
    pub post_url: String,
    pub post_title: Option<String>,
    pub comments: u64,
    pub flagged: u64,
}

/// Persistent store for scored comments
///
/// Writes are idempotent: storing a comment whose id already exists
/// replaces the stored row.
pub trait CommentStore {
    // ===== Writes =====

    /// Inserts or replaces rows keyed by id
    ///
    /// # Arguments
    ///
    /// * `rows` - Scored comments from one or more crawl passes
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn upsert(&mut self, rows: &[ScoredComment]) -> StorageResult<usize>;

    // ===== Reads =====

    /// Gets one comment by id
    fn get_comment(&self, id: &str) -> StorageResult<Option<ScoredComment>>;

    /// Total number of stored comments
    fn count_comments(&self) -> StorageResult<u64>;

    /// Number of flagged comments
    fn count_flagged(&self) -> StorageResult<u64>;

    /// Per-post counts, busiest posts first
    fn comments_per_post(&self) -> StorageResult<Vec<PostCount>>;
}
