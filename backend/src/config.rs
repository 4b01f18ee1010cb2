//! Configuration for the prediction backend.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration structure.
///
/// Every section has defaults, so an empty environment yields a runnable
/// local setup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Where incident images are downloaded from.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    /// Base URL that image names are appended to.
    #[serde(default = "default_images_url")]
    pub base_url: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            base_url: default_images_url(),
        }
    }
}

/// Image classification model server.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_url")]
    pub base_url: String,
    /// Class labels, in the order the model emits probabilities.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_url(),
            labels: default_labels(),
        }
    }
}

/// Ollama server used for context generation.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_llm_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL (`sqlite:` prefix optional, `:memory:` allowed).
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Task queue worker pool.
#[derive(Debug, Clone, Deserialize)]
pub struct TasksConfig {
    /// Maximum number of jobs executing at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending jobs the queue holds before dispatch waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long the HTTP path waits for each job result.
    #[serde(default = "default_result_timeout")]
    pub result_timeout_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            result_timeout_secs: default_result_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Origins allowed to open `/ws/image/predict`.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_images_url() -> String {
    "http://localhost:8000/uploads".to_string()
}
fn default_model_url() -> String {
    "http://localhost:8501".to_string()
}
fn default_labels() -> Vec<String> {
    [
        "Caniveau obstrué",
        "Déchets solides",
        "Erosion",
        "Inondation",
        "Pollution de l'air",
        "Pollution de l'eau",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/mapaction.db".to_string()
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    64
}
fn default_result_timeout() -> u64 {
    120
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MAPACTION__SECTION__KEY format, lists comma-separated)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("MAPACTION")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("model.labels")
                    .with_list_parse_key("websocket.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
