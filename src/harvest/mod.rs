//! Harvesting layer: everything that reads a live page
//!
//! # Components
//!
//! - `step`: the per-step success/skip/fail outcome
//! - `overlay`: app-wall suppression (request filter, stylesheet, removal pass)
//! - `links`: post link discovery on profile pages
//! - `loader`: comment section scrolling
//! - `extractor`: comment records from rendered items or structured data

mod extractor;
mod links;
mod loader;
mod overlay;
mod step;

pub use extractor::{comments_from_json, parse_item_text, CommentExtractor, Extraction};
pub use links::{extract_candidates, LinkHarvester};
pub use loader::{count_items, CommentLoader, LoadReport, CONTAINER_SELECTORS, ITEM_SELECTORS};
pub use overlay::{InstallReport, OverlaySuppressor};
pub use step::StepOutcome;
