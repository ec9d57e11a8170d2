//! Statistics generation from the comment store
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics, both for the stored history and for one run.

use crate::crawler::CrawlReport;
use crate::storage::{CommentStore, PostCount, StorageResult};

/// Number of posts listed in the per-post breakdown
const TOP_POSTS: usize = 10;

/// Comment store statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentStatistics {
    /// Total number of stored comments
    pub total_comments: u64,

    /// Number of flagged comments
    pub flagged: u64,

    /// Per-post counts, most commented first
    pub posts: Vec<PostCount>,
}

impl CommentStatistics {
    /// Flagged share of all comments, in percent
    pub fn flagged_rate(&self) -> f64 {
        percentage(self.flagged, self.total_comments)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The comment store to query
///
/// # Returns
///
/// * `Ok(CommentStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn CommentStore) -> StorageResult<CommentStatistics> {
    Ok(CommentStatistics {
        total_comments: store.count_comments()?,
        flagged: store.count_flagged()?,
        posts: store.comments_per_post()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CommentStatistics) {
    println!("=== Comment Statistics ===\n");

    println!("Overview:");
    println!("  Posts: {}", stats.posts.len());
    println!("  Comments stored: {}", stats.total_comments);
    println!(
        "  Flagged: {} ({:.1}%)",
        stats.flagged,
        stats.flagged_rate()
    );
    println!();

    if !stats.posts.is_empty() {
        println!("Top Posts:");
        for post in stats.posts.iter().take(TOP_POSTS) {
            let title = post.post_title.as_deref().unwrap_or("(untitled)");
            println!(
                "  {} flagged / {} comments  {}  {}",
                post.flagged, post.comments, title, post.post_url
            );
        }
        if stats.posts.len() > TOP_POSTS {
            println!("  ... and {} more", stats.posts.len() - TOP_POSTS);
        }
        println!();
    }
}

/// Prints the outcome of one crawl run
pub fn print_run_summary(report: &CrawlReport, stored: usize) {
    println!("=== Crawl Summary ===\n");
    println!("Target: {}", report.target);
    println!("Final state: {}", report.trail.current());
    println!("Posts visited: {}", report.posts.len());

    for post in &report.posts {
        let profile = post
            .profile
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(
            "  {} comments, {} flagged [{}] {}",
            post.comments, post.flagged, profile, post.url
        );
    }

    println!(
        "Comments: {} ({} flagged, {:.1}%)",
        report.total_comments(),
        report.flagged_count(),
        percentage(report.flagged_count() as u64, report.total_comments() as u64)
    );
    println!("Stored: {}", stored);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{comment_id, ScoredComment};
    use crate::storage::SqliteStore;

    fn row(post: &str, text: &str, flagged: bool) -> ScoredComment {
        ScoredComment {
            id: comment_id(post, "a", text),
            post_url: post.to_string(),
            post_title: None,
            author: "a".to_string(),
            text: text.to_string(),
            scraped_at: "2026-01-01T00:00:00+00:00".to_string(),
            rule_score: 0.0,
            model_scores: None,
            flagged,
        }
    }

    #[test]
    fn test_load_statistics() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .upsert(&[
                row("p1", "one", true),
                row("p1", "two", false),
                row("p2", "three", false),
                row("p2", "four", false),
            ])
            .unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_comments, 4);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.posts.len(), 2);
        assert_eq!(stats.flagged_rate(), 25.0);
    }

    #[test]
    fn test_empty_store() {
        let store = SqliteStore::new_in_memory().unwrap();
        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats, CommentStatistics::default());
        assert_eq!(stats.flagged_rate(), 0.0);
    }
}
