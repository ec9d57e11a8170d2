//! Crawler module for comment harvesting runs
//!
//! This module contains the top-level crawl logic, including:
//! - The orchestrator state machine for profile and single-post crawls
//! - Device-profile fallback around every attempt
//! - Debug snapshots of pages that yielded nothing
//! - Per-run reports handed to storage and the CLI

mod coordinator;
mod debug;

pub use coordinator::{CrawlOrchestrator, Politeness};
pub use debug::{DebugSink, Snapshot};

use crate::browser::DeviceProfile;
use crate::comment::ScoredComment;
use crate::state::StateTrail;

/// Outcome of visiting one post
#[derive(Debug, Clone, PartialEq)]
pub struct PostReport {
    /// The URL that was visited
    pub url: String,

    /// Page title, when one was read
    pub title: Option<String>,

    /// Number of scored comments
    pub comments: usize,

    /// Number of flagged comments
    pub flagged: usize,

    /// Profile that produced the comments; `None` if none did
    pub profile: Option<DeviceProfile>,

    /// States the visit went through
    pub trail: StateTrail,
}

impl PostReport {
    pub fn new(
        url: impl Into<String>,
        title: Option<String>,
        profile: Option<DeviceProfile>,
        trail: StateTrail,
    ) -> Self {
        Self {
            url: url.into(),
            title,
            comments: 0,
            flagged: 0,
            profile,
            trail,
        }
    }
}

/// Outcome of a whole crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    /// The profile or post URL the run started from
    pub target: String,

    /// One entry per visited post, in visiting order
    pub posts: Vec<PostReport>,

    /// All scored rows, ready for storage
    pub rows: Vec<ScoredComment>,

    /// States of the top-level crawl
    pub trail: StateTrail,
}

impl CrawlReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            posts: Vec::new(),
            rows: Vec::new(),
            trail: StateTrail::new(),
        }
    }

    /// Appends the result of one post visit
    pub fn push(&mut self, post: PostReport, rows: Vec<ScoredComment>) {
        self.posts.push(post);
        self.rows.extend(rows);
    }

    pub fn total_comments(&self) -> usize {
        self.rows.len()
    }

    pub fn flagged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.flagged).count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
