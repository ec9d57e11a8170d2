//! Output module for run summaries and stored statistics
//!
//! This module handles:
//! - Printing the summary of a finished crawl run
//! - Reporting aggregate statistics from the comment store

pub mod stats;

pub use stats::{load_statistics, print_run_summary, print_statistics, CommentStatistics};
