//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: where a crawl attempt is in the orchestrator's state machine
//! - `StateTrail`: the ordered states one crawl passed through
//! - `HarvestState`: discovered items and stall tracking for one scroll loop

mod crawl_state;
mod harvest_state;

// Re-export main types
pub use crawl_state::{CrawlState, StateTrail};
pub use harvest_state::HarvestState;
