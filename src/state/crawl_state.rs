/// Crawl state definitions for the orchestrator
///
/// A crawl of a profile or a single post walks these states. Each attempt
/// records the states it visits in a [`StateTrail`], which makes the
/// fallback path observable in reports and tests.
use std::fmt;

/// Represents where a crawl attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// A browsing context is open, nothing loaded yet
    Start,

    /// Navigating to the target URL
    Navigate,

    /// Sweeping app-wall overlays off the loaded page
    SuppressOverlays,

    /// Scrolling a profile page for post links
    HarvestLinks,

    /// Visiting harvested posts one after another
    VisitPosts,

    /// Scrolling a post's comment section
    LoadComments,

    /// Reading comments off the page
    Extract,

    /// Attaching toxicity scores
    Score,

    /// Zero results under the default profile; retrying under the fallback
    ErrorFallback,

    // ===== Terminal States =====
    /// Finished with results
    Done,

    /// Still zero results after the fallback; a debug snapshot was taken
    Failed,
}

impl CrawlState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Start, Navigate)
                | (Navigate, SuppressOverlays)
                | (Navigate, ErrorFallback)
                | (Navigate, Failed)
                | (SuppressOverlays, HarvestLinks)
                | (SuppressOverlays, LoadComments)
                | (HarvestLinks, VisitPosts)
                | (HarvestLinks, ErrorFallback)
                | (HarvestLinks, Failed)
                | (VisitPosts, Done)
                | (LoadComments, Extract)
                | (Extract, Score)
                | (Extract, ErrorFallback)
                | (Extract, Failed)
                | (Score, Done)
                | (ErrorFallback, Start)
        )
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Navigate => "navigate",
            Self::SuppressOverlays => "suppress-overlays",
            Self::HarvestLinks => "harvest-links",
            Self::VisitPosts => "visit-posts",
            Self::LoadComments => "load-comments",
            Self::Extract => "extract",
            Self::Score => "score",
            Self::ErrorFallback => "error-fallback",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered record of the states a crawl went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    states: Vec<CrawlState>,
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrail {
    /// Creates a trail positioned at `Start`
    pub fn new() -> Self {
        Self {
            states: vec![CrawlState::Start],
        }
    }

    /// The state the crawl is in now
    pub fn current(&self) -> CrawlState {
        self.states
            .last()
            .copied()
            .unwrap_or(CrawlState::Start)
    }

    /// Moves to `next`
    ///
    /// An illegal transition is a bug in the orchestrator. It is logged and
    /// recorded anyway so the trail stays truthful.
    pub fn advance(&mut self, next: CrawlState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::error!("Invalid crawl state transition: {} -> {}", current, next);
        } else {
            tracing::debug!("Crawl state: {} -> {}", current, next);
        }
        self.states.push(next);
    }

    /// All visited states in order
    pub fn states(&self) -> &[CrawlState] {
        &self.states
    }

    /// Returns true if the trail passed through `state`
    pub fn visited(&self, state: CrawlState) -> bool {
        self.states.contains(&state)
    }

    /// Returns true if every recorded step was a legal transition
    pub fn is_consistent(&self) -> bool {
        self.states
            .windows(2)
            .all(|pair| pair[0].can_transition_to(pair[1]))
    }
}
