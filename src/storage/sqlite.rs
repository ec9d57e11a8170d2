//! SQLite storage implementation

use crate::comment::ScoredComment;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CommentStore, PostCount, StorageResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const UPSERT_SQL: &str = "
    INSERT INTO comments
        (id, post_url, post_title, author, text, scraped_at, rule_score, model_scores, flagged)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        post_url = excluded.post_url,
        post_title = excluded.post_title,
        author = excluded.author,
        text = excluded.text,
        scraped_at = excluded.scraped_at,
        rule_score = excluded.rule_score,
        model_scores = excluded.model_scores,
        flagged = excluded.flagged
";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        tracing::debug!("Opened comment store at {}", path.display());

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<(ScoredComment, Option<String>)> {
    Ok((
        ScoredComment {
            id: row.get(0)?,
            post_url: row.get(1)?,
            post_title: row.get(2)?,
            author: row.get(3)?,
            text: row.get(4)?,
            scraped_at: row.get(5)?,
            rule_score: row.get(6)?,
            model_scores: None,
            flagged: row.get::<_, i64>(8)? != 0,
        },
        row.get(7)?,
    ))
}

impl CommentStore for SqliteStore {
    // ===== Writes =====

    fn upsert(&mut self, rows: &[ScoredComment]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for row in rows {
                let model_scores = row
                    .model_scores
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![
                    row.id,
                    row.post_url,
                    row.post_title,
                    row.author,
                    row.text,
                    row.scraped_at,
                    row.rule_score,
                    model_scores,
                    row.flagged as i64,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Upserted {} comments", rows.len());
        Ok(rows.len())
    }

    // ===== Reads =====

    fn get_comment(&self, id: &str) -> StorageResult<Option<ScoredComment>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, post_url, post_title, author, text, scraped_at, rule_score,
                        model_scores, flagged
                 FROM comments WHERE id = ?1",
                params![id],
                row_to_comment,
            )
            .optional()?;

        match found {
            Some((mut comment, scores)) => {
                comment.model_scores = scores
                    .map(|json| serde_json::from_str::<BTreeMap<String, f64>>(&json))
                    .transpose()?;
                Ok(Some(comment))
            }
            None => Ok(None),
        }
    }

    fn count_comments(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_flagged(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE flagged = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn comments_per_post(&self) -> StorageResult<Vec<PostCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT post_url, MAX(post_title), COUNT(*), SUM(flagged)
             FROM comments
             GROUP BY post_url
             ORDER BY COUNT(*) DESC, post_url ASC",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok(PostCount {
                    post_url: row.get(0)?,
                    post_title: row.get(1)?,
                    comments: row.get::<_, i64>(2)? as u64,
                    flagged: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}
