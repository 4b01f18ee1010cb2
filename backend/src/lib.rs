pub mod adapters;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod store;
pub mod tasks;
pub mod test_util;
pub mod ws;

pub use config::Config;
pub use error::Error;
pub use pipeline::Pipeline;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::{
    ContextAdapter, HttpClassifier, ImageClassifier, ImageFetcher, OllamaGenerator,
    PredictionAdapter, TextGenerator,
};
use crate::store::{PredictionStore, StoreError};
use crate::tasks::{TaskQueue, TaskWorker};
use crate::ws::ConnectionManager;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
    /// Open WebSocket sessions.
    pub connections: Arc<ConnectionManager>,
    pub store: Arc<PredictionStore>,
}

impl AppState {
    /// Wire the pipeline around the given model backends and spawn the task
    /// worker. Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        classifier: Arc<dyn ImageClassifier>,
        generator: Arc<dyn TextGenerator>,
        store: PredictionStore,
    ) -> Arc<Self> {
        let prediction = Arc::new(PredictionAdapter::new(
            classifier,
            config.model.labels.clone(),
        ));
        let context = Arc::new(ContextAdapter::new(generator));
        let store = Arc::new(store);

        let (queue, jobs) = TaskQueue::new(config.tasks.queue_capacity);
        tokio::spawn(
            TaskWorker::new(
                jobs,
                prediction.clone(),
                context.clone(),
                config.tasks.workers,
            )
            .run(),
        );

        let pipeline = Pipeline::new(
            ImageFetcher::new(&config.images.base_url),
            prediction,
            context,
            queue,
            store.clone(),
            Duration::from_secs(config.tasks.result_timeout_secs),
        );

        Arc::new(Self {
            config,
            pipeline: Arc::new(pipeline),
            connections: Arc::new(ConnectionManager::new()),
            store,
        })
    }

    /// Build state with the HTTP model server, Ollama and the configured database.
    pub fn from_config(config: Config) -> Result<Arc<Self>, StoreError> {
        let classifier = Arc::new(HttpClassifier::new(&config.model.base_url));
        let generator = Arc::new(OllamaGenerator::new(
            &config.llm.base_url,
            &config.llm.model,
        ));
        let store = PredictionStore::new(&config.database.url)?;

        tracing::info!(
            "Using classifier at {} ({} labels), LLM {} at {}",
            config.model.base_url,
            config.model.labels.len(),
            config.llm.model,
            config.llm.base_url
        );

        Ok(Self::new(config, classifier, generator, store))
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::predict::router())
        .route("/ws/image/predict", get(ws::ws_handler))
        .with_state(state)
        .layer(middleware::from_fn(logging::request_logger))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
