//! Optional ML toxicity model
//!
//! The model is an external service: a batch of texts goes in, one
//! probability series per toxicity dimension comes out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Per-dimension probabilities, one entry per input text
pub type Predictions = BTreeMap<String, Vec<f64>>;

/// Errors raised by the toxicity model client
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// A batch toxicity predictor
#[async_trait]
pub trait ToxicityModel: Send + Sync {
    /// Predicts toxicity dimensions for every text
    ///
    /// # Returns
    ///
    /// * `Ok(Predictions)` - Dimension name to per-text probabilities
    /// * `Err(ModelError)` - The model is unavailable
    async fn predict(&self, texts: &[String]) -> Result<Predictions, ModelError>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    texts: &'a [String],
}

/// Toxicity model served over HTTP
///
/// Sends `POST {"texts": [...]}` and expects `{"<dimension>": [p, ...]}`.
#[derive(Debug, Clone)]
pub struct HttpToxicityModel {
    client: Client,
    endpoint: String,
}

impl HttpToxicityModel {
    /// Creates a client for the given endpoint
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the prediction endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(HttpToxicityModel)` - Client ready to use
    /// * `Err(ModelError)` - The HTTP client could not be built
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ToxicityModel for HttpToxicityModel {
    async fn predict(&self, texts: &[String]) -> Result<Predictions, ModelError> {
        if texts.is_empty() {
            return Ok(Predictions::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictRequest { texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        parse_predictions(&body)
    }
}

fn parse_predictions(body: &serde_json::Value) -> Result<Predictions, ModelError> {
    let object = body
        .as_object()
        .ok_or_else(|| ModelError::InvalidResponse("expected a JSON object".to_string()))?;

    object
        .iter()
        .map(|(dimension, series)| {
            let values = series
                .as_array()
                .ok_or_else(|| {
                    ModelError::InvalidResponse(format!("{} is not an array", dimension))
                })?
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        ModelError::InvalidResponse(format!("non-numeric score in {}", dimension))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((dimension.clone(), values))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_predict_parses_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(json!({"texts": ["nice", "awful"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "toxicity": [0.01, 0.93],
                "insult": [0.0, 0.81]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = HttpToxicityModel::new(format!("{}/predict", server.uri())).unwrap();
        let predictions = model
            .predict(&["nice".to_string(), "awful".to_string()])
            .await
            .unwrap();

        assert_eq!(predictions["toxicity"], vec![0.01, 0.93]);
        assert_eq!(predictions["insult"], vec![0.0, 0.81]);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let model = HttpToxicityModel::new(server.uri()).unwrap();
        let result = model.predict(&["x".to_string()]).await;
        assert!(matches!(result, Err(ModelError::Status(503))));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let model = HttpToxicityModel::new(server.uri()).unwrap();
        assert!(model.predict(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_malformed_response_rejected() {
        assert!(parse_predictions(&json!([1, 2])).is_err());
        assert!(parse_predictions(&json!({"toxicity": "high"})).is_err());
        assert!(parse_predictions(&json!({"toxicity": [0.5, "x"]})).is_err());
    }
}
