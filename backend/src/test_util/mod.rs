pub mod mock_ollama;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{AdapterError, ClassifierOutput, ImageClassifier, TextGenerator};
use crate::config::Config;
use crate::store::PredictionStore;
use crate::AppState;

/// Configuration pointing at nothing real, with an in-memory database.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.model.labels = vec!["flood".to_string(), "fire".to_string()];
    config.database.url = ":memory:".to_string();
    config.tasks.workers = 2;
    config.tasks.queue_capacity = 8;
    config.tasks.result_timeout_secs = 5;
    config.websocket.allowed_origins = vec!["http://localhost:3000".to_string()];
    config.logging.level = "debug".to_string();
    config
}

/// Build state around the given fakes and an in-memory store.
///
/// Must be called inside a tokio runtime; the task worker is spawned here.
pub fn create_test_state(
    config: Config,
    classifier: Arc<dyn ImageClassifier>,
    generator: Arc<dyn TextGenerator>,
) -> Arc<AppState> {
    let store = PredictionStore::new(":memory:").unwrap();
    AppState::new(config, classifier, generator, store)
}

/// Classifier returning the same probabilities for every image.
pub struct StaticClassifier {
    probabilities: Vec<f64>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self {
            probabilities,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageClassifier for StaticClassifier {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn classify(&self, _image: &[u8]) -> Result<ClassifierOutput, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ClassifierOutput {
            label: None,
            probabilities: self.probabilities.clone(),
        })
    }
}

/// Text generator replaying canned answers and recording prompts.
pub struct ScriptedGenerator {
    replies: Vec<String>,
    fail_at: Option<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Answer call `n` with `replies[n % replies.len()]`.
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            fail_at: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer normally, except call `index` fails with a service error.
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::replying(["texte généré"])
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, AdapterError> {
        let index = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len() - 1
        };

        if self.fail_at == Some(index) {
            return Err(AdapterError::Service("scripted failure".to_string()));
        }
        if self.replies.is_empty() {
            return Ok(String::new());
        }
        Ok(self.replies[index % self.replies.len()].clone())
    }
}
