//! Comment extraction from a loaded post page
//!
//! Rendered comment items are read first. Only when none can be read does
//! extraction fall back to the page's embedded JSON-LD blocks, which some
//! pages hydrate from without rendering matching markup.

use crate::browser::PageDriver;
use crate::comment::RawComment;
use crate::harvest::loader::ITEM_SELECTORS;
use crate::harvest::step::StepOutcome;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Per-item text read budget
const ITEM_READ_TIMEOUT: Duration = Duration::from_millis(1500);

/// Per-block read budget for structured data
const LD_READ_TIMEOUT: Duration = Duration::from_millis(800);

const LD_SELECTOR: &str = "script[type='application/ld+json']";

/// Author names are cut to this many characters
pub const MAX_AUTHOR_CHARS: usize = 80;

/// What was extracted from one post page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub title: Option<String>,
    pub comments: Vec<RawComment>,
}

/// Reads comments out of a post page
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentExtractor;

impl CommentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the page title and comments
    ///
    /// Unreadable items are skipped without aborting the batch. A page
    /// that cannot be read at all yields an empty extraction.
    pub async fn extract<P: PageDriver + ?Sized>(&self, page: &P) -> Extraction {
        let title = match page.title().await {
            Ok(title) => title.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::debug!("Title unavailable: {}", e);
                None
            }
        };

        let mut comments = self.from_items(page).await;
        if comments.is_empty() {
            comments = self.from_structured_data(page).await;
            if !comments.is_empty() {
                tracing::info!(
                    "Recovered {} comments from structured data",
                    comments.len()
                );
            }
        }

        tracing::info!("Extracted {} comments", comments.len());
        Extraction { title, comments }
    }

    /// Primary path: text of the rendered comment items
    async fn from_items<P: PageDriver + ?Sized>(&self, page: &P) -> Vec<RawComment> {
        let mut seen = HashSet::new();
        let mut comments = Vec::new();

        'selectors: for selector in ITEM_SELECTORS {
            let count = match StepOutcome::from_result(page.count(selector).await) {
                StepOutcome::Success(n) => n,
                StepOutcome::Skip { .. } => continue,
                StepOutcome::Fail(e) => {
                    tracing::warn!("Comment extraction stopped: {}", e);
                    break;
                }
            };

            for index in 0..count {
                let text = match StepOutcome::from_result(
                    page.inner_text(selector, index, ITEM_READ_TIMEOUT).await,
                ) {
                    StepOutcome::Success(text) => text,
                    StepOutcome::Skip { reason } => {
                        tracing::debug!("Skipping {}[{}]: {}", selector, index, reason);
                        continue;
                    }
                    StepOutcome::Fail(e) => {
                        tracing::warn!("Comment extraction stopped: {}", e);
                        break 'selectors;
                    }
                };

                if let Some(comment) = parse_item_text(&text) {
                    if seen.insert((comment.author.clone(), comment.text.clone())) {
                        comments.push(comment);
                    }
                }
            }
        }

        comments
    }

    /// Fallback path: `comment` collections in JSON-LD blocks
    async fn from_structured_data<P: PageDriver + ?Sized>(&self, page: &P) -> Vec<RawComment> {
        let blocks = match page.count(LD_SELECTOR).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("Structured data unavailable: {}", e);
                return Vec::new();
            }
        };

        let mut comments = Vec::new();
        for index in 0..blocks {
            let raw = match page.inner_text(LD_SELECTOR, index, LD_READ_TIMEOUT).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!("Skipping structured data block {}: {}", index, e);
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => comments.extend(comments_from_json(&value)),
                Err(e) => tracing::debug!("Malformed structured data block {}: {}", index, e),
            }
        }
        comments
    }
}

/// Splits an item's visible text into author and body
///
/// The first non-empty line is the author (cut to [`MAX_AUTHOR_CHARS`]);
/// the remaining lines, joined by spaces, are the body. Returns `None`
/// when there is no text at all.
pub fn parse_item_text(text: &str) -> Option<RawComment> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let author: String = lines.next()?.chars().take(MAX_AUTHOR_CHARS).collect();
    let body = lines.collect::<Vec<_>>().join(" ");
    Some(RawComment::new(author, body))
}

/// Comments found in one parsed JSON-LD value
///
/// Accepts a single object, an array of objects, or an object with an
/// `@graph` array. Entries without text are dropped.
pub fn comments_from_json(value: &Value) -> Vec<RawComment> {
    match value {
        Value::Array(items) => items.iter().flat_map(comments_from_json).collect(),
        Value::Object(map) => {
            let mut comments: Vec<RawComment> = map
                .get("comment")
                .map(|c| match c {
                    Value::Array(entries) => entries.iter().filter_map(comment_entry).collect(),
                    single => comment_entry(single).into_iter().collect(),
                })
                .unwrap_or_default();
            if let Some(graph) = map.get("@graph") {
                comments.extend(comments_from_json(graph));
            }
            comments
        }
        _ => Vec::new(),
    }
}

fn comment_entry(entry: &Value) -> Option<RawComment> {
    let text = entry
        .get("text")
        .or_else(|| entry.get("commentText"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())?;

    let author = match entry.get("author") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Object(person)) => person
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };

    Some(RawComment::new(author, text))
}
