//! Toxicity scoring
//!
//! # Components
//!
//! - `rules`: the deterministic rule scorer (`RuleScorer`, `LexiconScorer`)
//! - `model`: the optional ML model client (`ToxicityModel`, `HttpToxicityModel`)
//! - `pipeline`: combines both into scored, flagged rows

mod model;
mod pipeline;
mod rules;

pub use model::{HttpToxicityModel, ModelError, Predictions, ToxicityModel};
pub use pipeline::{is_flagged, ScoringPipeline};
pub use rules::{LexiconScorer, RuleScorer};
