//! Adapters around the external model services.
//!
//! Each external call sits behind a trait (`ImageClassifier`,
//! `TextGenerator`) so the pipeline can run against HTTP backends in
//! production and in-process fakes in tests. The adapters on top
//! (`PredictionAdapter`, `ContextAdapter`) normalize the raw outputs and log
//! failures before handing them back as `AdapterError`.

mod classifier;
mod context;
mod image;
mod ollama;

pub use classifier::{HttpClassifier, PredictionAdapter};
pub use context::{ContextAdapter, PromptKind};
pub use image::{FetchError, ImageFetcher};
pub use ollama::OllamaGenerator;

use async_trait::async_trait;

/// Error returned by adapters and the services they wrap.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service communication error: {0}")]
    Communication(String),

    #[error("Service returned an error: {0}")]
    Service(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Raw classifier output, before it is matched against the label set.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    /// Label reported by the model, if it reports one.
    pub label: Option<String>,
    pub probabilities: Vec<f64>,
}

/// Image classification backend.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn classify(&self, image: &[u8]) -> Result<ClassifierOutput, AdapterError>;
}

/// Text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Generate a completion for a single prompt.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, AdapterError>;
}
