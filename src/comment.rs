//! Comment records
//!
//! `RawComment` is what the extractor reads off the page; `ScoredComment`
//! is the row handed to the store after scoring.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A comment as extracted from the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    pub author: String,
    pub text: String,
}

impl RawComment {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

/// A scored comment, ready for an idempotent upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredComment {
    /// Fingerprint of `(post_url, author, text)`
    pub id: String,
    pub post_url: String,
    pub post_title: Option<String>,
    pub author: String,
    pub text: String,
    /// RFC 3339 timestamp of the crawl pass
    pub scraped_at: String,
    pub rule_score: f64,
    /// Per-dimension model probabilities, absent when the model was not used
    pub model_scores: Option<BTreeMap<String, f64>>,
    pub flagged: bool,
}

/// Computes the fingerprint id of a comment
///
/// The id is the hex SHA-256 of the three fields joined by a unit
/// separator, so identical inputs always produce the same id and field
/// boundaries cannot be shifted (`("ab", "c")` differs from `("a", "bc")`).
///
/// # Examples
///
/// ```
/// use comment_sentry::comment_id;
///
/// let a = comment_id("https://example.com/post/1", "alice", "hi");
/// let b = comment_id("https://example.com/post/1", "alice", "hi");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn comment_id(post_url: &str, author: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(post_url.as_bytes());
    hasher.update([0x1f]);
    hasher.update(author.as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_id_is_stable() {
        let first = comment_id("https://example.com/post/1", "alice", "nice post");
        for _ in 0..5 {
            assert_eq!(
                comment_id("https://example.com/post/1", "alice", "nice post"),
                first
            );
        }
    }

    #[test]
    fn test_comment_id_changes_with_each_field() {
        let base = comment_id("https://example.com/post/1", "alice", "nice post");
        assert_ne!(
            base,
            comment_id("https://example.com/post/2", "alice", "nice post")
        );
        assert_ne!(
            base,
            comment_id("https://example.com/post/1", "bob", "nice post")
        );
        assert_ne!(
            base,
            comment_id("https://example.com/post/1", "alice", "nice post!")
        );
    }

    #[test]
    fn test_comment_id_field_boundaries() {
        assert_ne!(comment_id("u", "ab", "c"), comment_id("u", "a", "bc"));
    }
}
