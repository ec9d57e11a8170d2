//! Deterministic rule-based scoring

use regex::Regex;

/// A pure text scorer
pub trait RuleScorer: Send + Sync {
    /// Scores one comment body; higher is more abusive
    fn score(&self, text: &str) -> f64;
}

/// Built-in weighted terms; each occurrence adds its weight
const DEFAULT_TERMS: &[(&str, f64)] = &[
    ("kill yourself", 5.0),
    ("kys", 5.0),
    ("die", 2.0),
    ("idiot", 2.0),
    ("stupid", 1.5),
    ("moron", 2.0),
    ("loser", 1.5),
    ("ugly", 1.5),
    ("disgusting", 1.5),
    ("pathetic", 1.5),
    ("trash", 1.0),
    ("shut up", 1.0),
    ("hate you", 2.0),
    ("nobody likes you", 2.5),
    ("worthless", 2.5),
    ("freak", 1.5),
];

const SHOUT_WEIGHT: f64 = 1.0;
const SHOUT_MIN_LETTERS: usize = 8;
const SHOUT_UPPER_RATIO: f64 = 0.7;
const PUNCTUATION_WEIGHT: f64 = 0.5;

/// Lexicon scorer
///
/// Sums the weights of abusive terms (whole words, case-insensitive), then
/// adds a point for shouting (mostly uppercase text with at least eight
/// letters) and half a point for runs of `!!!` or `???`.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    terms: Vec<(Regex, f64)>,
}

impl LexiconScorer {
    /// Builds a scorer from `(term, weight)` pairs
    ///
    /// # Returns
    ///
    /// * `Ok(LexiconScorer)` - Scorer ready to use
    /// * `Err(regex::Error)` - A term produced an invalid pattern
    pub fn new<S: AsRef<str>>(terms: &[(S, f64)]) -> Result<Self, regex::Error> {
        let terms = terms
            .iter()
            .map(|(term, weight)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term.as_ref()));
                Regex::new(&pattern).map(|re| (re, *weight))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { terms })
    }

    fn is_shouting(text: &str) -> bool {
        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() < SHOUT_MIN_LETTERS {
            return false;
        }
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        upper as f64 / letters.len() as f64 >= SHOUT_UPPER_RATIO
    }

    fn has_punctuation_run(text: &str) -> bool {
        let mut run = 0;
        for c in text.chars() {
            if c == '!' || c == '?' {
                run += 1;
                if run >= 3 {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new(DEFAULT_TERMS).unwrap_or_else(|e| {
            tracing::error!("Built-in lexicon failed to compile: {}", e);
            Self { terms: Vec::new() }
        })
    }
}

impl RuleScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let mut score: f64 = self
            .terms
            .iter()
            .map(|(re, weight)| re.find_iter(text).count() as f64 * weight)
            .sum();

        if Self::is_shouting(text) {
            score += SHOUT_WEIGHT;
        }
        if Self::has_punctuation_run(text) {
            score += PUNCTUATION_WEIGHT;
        }
        score
    }
}
