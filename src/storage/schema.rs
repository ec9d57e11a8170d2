//! Database schema definitions
//!
//! One table of scored comments keyed by fingerprint id.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Scored comments, one row per fingerprint
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    post_url TEXT NOT NULL,
    post_title TEXT,
    author TEXT NOT NULL,
    text TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    rule_score REAL NOT NULL,
    model_scores TEXT,
    flagged INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_url);
CREATE INDEX IF NOT EXISTS idx_comments_flagged ON comments(flagged);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_comments_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='comments'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
