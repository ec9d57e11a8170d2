//! Rule and model scores combined into a flagged verdict

use crate::comment::{comment_id, RawComment, ScoredComment};
use crate::config::ScoringConfig;
use crate::scoring::model::{HttpToxicityModel, ModelError, ToxicityModel};
use crate::scoring::rules::{LexiconScorer, RuleScorer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Flag policy
///
/// A comment is flagged when its rule score reaches `rule_threshold`, or
/// when any single model dimension reaches `toxic_threshold`. One hot
/// dimension is enough, so this leans toward over-flagging.
pub fn is_flagged(
    rule_score: f64,
    model_scores: Option<&BTreeMap<String, f64>>,
    rule_threshold: f64,
    toxic_threshold: f64,
) -> bool {
    rule_score >= rule_threshold
        || model_scores.is_some_and(|scores| scores.values().any(|&p| p >= toxic_threshold))
}

/// Scores extracted comments
#[derive(Clone)]
pub struct ScoringPipeline {
    rules: Arc<dyn RuleScorer>,
    model: Option<Arc<dyn ToxicityModel>>,
    rule_threshold: f64,
    toxic_threshold: f64,
}

impl ScoringPipeline {
    /// Creates a rule-only pipeline
    pub fn new(rules: Arc<dyn RuleScorer>, config: &ScoringConfig) -> Self {
        Self {
            rules,
            model: None,
            rule_threshold: config.rule_threshold,
            toxic_threshold: config.toxic_threshold,
        }
    }

    /// Adds an ML model to the pipeline
    pub fn with_model(mut self, model: Arc<dyn ToxicityModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Builds the pipeline described by the configuration
    ///
    /// Uses the lexicon scorer, plus the HTTP model when `use_model` is set
    /// and an endpoint is configured.
    pub fn from_config(config: &ScoringConfig) -> Result<Self, ModelError> {
        let pipeline = Self::new(Arc::new(LexiconScorer::default()), config);
        match (&config.model_url, config.use_model) {
            (Some(url), true) => {
                tracing::info!("ML toxicity scoring enabled ({})", url);
                Ok(pipeline.with_model(Arc::new(HttpToxicityModel::new(url.clone())?)))
            }
            (None, true) => {
                tracing::warn!("ML scoring requested without a model URL; using rules only");
                Ok(pipeline)
            }
            _ => Ok(pipeline),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Scores every comment of one post
    ///
    /// # Arguments
    ///
    /// * `post_url` - URL the comments were read from
    /// * `post_title` - Page title, if any
    /// * `scraped_at` - Timestamp shared by every row of this pass
    /// * `comments` - Extracted comments
    ///
    /// # Returns
    ///
    /// One scored row per comment, in input order. If the model fails,
    /// every row carries no model scores and is judged on rules alone.
    pub async fn score(
        &self,
        post_url: &str,
        post_title: Option<&str>,
        scraped_at: &str,
        comments: &[RawComment],
    ) -> Vec<ScoredComment> {
        let model_scores = self.model_scores(comments).await;

        comments
            .iter()
            .zip(model_scores)
            .map(|(comment, model_scores)| {
                let rule_score = self.rules.score(&comment.text);
                let flagged = is_flagged(
                    rule_score,
                    model_scores.as_ref(),
                    self.rule_threshold,
                    self.toxic_threshold,
                );
                ScoredComment {
                    id: comment_id(post_url, &comment.author, &comment.text),
                    post_url: post_url.to_string(),
                    post_title: post_title.map(str::to_string),
                    author: comment.author.clone(),
                    text: comment.text.clone(),
                    scraped_at: scraped_at.to_string(),
                    rule_score,
                    model_scores,
                    flagged,
                }
            })
            .collect()
    }

    /// Per-comment model scores, `None` wherever the model has no answer
    async fn model_scores(&self, comments: &[RawComment]) -> Vec<Option<BTreeMap<String, f64>>> {
        let Some(model) = &self.model else {
            return vec![None; comments.len()];
        };
        let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();

        let predictions = match model.predict(&texts).await {
            Ok(predictions) => predictions,
            Err(e) => {
                tracing::warn!("Toxicity model unavailable, scoring with rules only: {}", e);
                return vec![None; comments.len()];
            }
        };

        (0..comments.len())
            .map(|i| {
                let row: Option<BTreeMap<String, f64>> = predictions
                    .iter()
                    .map(|(dimension, series)| series.get(i).map(|&p| (dimension.clone(), p)))
                    .collect();
                row.filter(|scores| !scores.is_empty())
            })
            .collect()
    }
}
