//! Prediction adapter and the HTTP model-server classifier.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;

use super::{AdapterError, ClassifierOutput, ImageClassifier};
use crate::models::Prediction;

/// Classifier served over HTTP.
///
/// Sends the raw image bytes to `{base_url}/predict` and expects
/// `{"probabilities": [...], "label": "..."}` back, `label` optional.
pub struct HttpClassifier {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponseBody {
    probabilities: Vec<f64>,
    #[serde(default)]
    label: Option<String>,
}

impl HttpClassifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageClassifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, image: &[u8]) -> Result<ClassifierOutput, AdapterError> {
        let url = format!("{}/predict", self.base_url);

        tracing::debug!("Sending {} image bytes to classifier at {}", image.len(), url);

        let response = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| AdapterError::Communication(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Service(format!("{}: {}", status, body)));
        }

        let body: PredictResponseBody = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        Ok(ClassifierOutput {
            label: body.label,
            probabilities: body.probabilities,
        })
    }
}

/// Wraps a classifier and normalizes its output against a fixed label set.
pub struct PredictionAdapter {
    classifier: Arc<dyn ImageClassifier>,
    labels: Vec<String>,
}

impl PredictionAdapter {
    pub fn new(classifier: Arc<dyn ImageClassifier>, labels: Vec<String>) -> Self {
        Self { classifier, labels }
    }

    /// Classify an image.
    ///
    /// On success the probabilities have exactly one entry per label. Errors
    /// are logged here and returned; this never panics.
    pub async fn perform_prediction(&self, image: &[u8]) -> Result<Prediction, AdapterError> {
        let result = self.predict(image).await;
        match &result {
            Ok(prediction) => tracing::info!(
                classifier = self.classifier.name(),
                label = %prediction.label,
                "Prediction complete"
            ),
            Err(e) => tracing::error!(
                classifier = self.classifier.name(),
                "Prediction failed: {}",
                e
            ),
        }
        result
    }

    async fn predict(&self, image: &[u8]) -> Result<Prediction, AdapterError> {
        if image.is_empty() {
            return Err(AdapterError::InvalidInput("image is empty".to_string()));
        }

        let output = self.classifier.classify(image).await?;
        self.normalize(output)
    }

    fn normalize(&self, output: ClassifierOutput) -> Result<Prediction, AdapterError> {
        if output.probabilities.len() != self.labels.len() {
            return Err(AdapterError::InvalidResponse(format!(
                "expected {} probabilities, got {}",
                self.labels.len(),
                output.probabilities.len()
            )));
        }
        if output.probabilities.iter().any(|p| !p.is_finite()) {
            return Err(AdapterError::InvalidResponse(
                "probabilities must be finite numbers".to_string(),
            ));
        }

        let label = match output.label {
            Some(label) if self.labels.contains(&label) => label,
            _ => self.argmax_label(&output.probabilities)?,
        };

        Ok(Prediction {
            label,
            probabilities: output.probabilities,
        })
    }

    fn argmax_label(&self, probabilities: &[f64]) -> Result<String, AdapterError> {
        probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| self.labels[i].clone())
            .ok_or_else(|| AdapterError::InvalidResponse("empty label set".to_string()))
    }
}
