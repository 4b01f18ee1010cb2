//! Prediction pipeline: fetch image, predict, generate context, persist.
//!
//! `run_queued` goes through the task queue and waits on each job with a
//! timeout (HTTP path). `run_direct` calls the adapters in-process with no
//! timeout (WebSocket path). Both share validation and persistence, so a row
//! is written only when every stage succeeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mapaction_common::{PredictRequest, PredictResponse};

use crate::adapters::{ContextAdapter, ImageFetcher, PredictionAdapter};
use crate::error::{Error, Result};
use crate::models::record::response_for;
use crate::models::{ContextResult, Prediction, PredictionRecord};
use crate::store::PredictionStore;
use crate::tasks::{TaskError, TaskQueue};

pub struct Pipeline {
    fetcher: ImageFetcher,
    prediction: Arc<PredictionAdapter>,
    context: Arc<ContextAdapter>,
    tasks: TaskQueue,
    store: Arc<PredictionStore>,
    result_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        fetcher: ImageFetcher,
        prediction: Arc<PredictionAdapter>,
        context: Arc<ContextAdapter>,
        tasks: TaskQueue,
        store: Arc<PredictionStore>,
        result_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            prediction,
            context,
            tasks,
            store,
            result_timeout,
        }
    }

    /// Run the pipeline through the task queue.
    pub async fn run_queued(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let image = self.fetch_image(request).await?;

        let prediction = self.queued_prediction(image).await.map_err(|e| {
            tracing::error!(image = %request.image_name, "Prediction task failed: {}", e);
            Error::Prediction(e.to_string())
        })?;

        let context = self
            .queued_context(&prediction, request)
            .await
            .map_err(|e| {
                tracing::error!(label = %prediction.label, "Context task failed: {}", e);
                Error::Context(e.to_string())
            })?;

        self.finish(request, prediction, context)
    }

    /// Run the pipeline with direct adapter calls.
    pub async fn run_direct(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let image = self.fetch_image(request).await?;

        let prediction = self
            .prediction
            .perform_prediction(&image)
            .await
            .map_err(|e| Error::Prediction(e.to_string()))?;

        let context = self
            .context
            .fetch_contextual_information(&prediction.label, &request.sensitive_structures)
            .await
            .map_err(|e| Error::Context(e.to_string()))?;

        self.finish(request, prediction, context)
    }

    async fn queued_prediction(&self, image: Vec<u8>) -> std::result::Result<Prediction, TaskError> {
        self.within_timeout(async move {
            match self.tasks.dispatch_prediction(image).await {
                Ok(handle) => handle.get(self.result_timeout).await,
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn queued_context(
        &self,
        prediction: &Prediction,
        request: &PredictRequest,
    ) -> std::result::Result<ContextResult, TaskError> {
        let label = prediction.label.clone();
        let structures = request.sensitive_structures.clone();
        self.within_timeout(async move {
            match self.tasks.dispatch_context(label, structures).await {
                Ok(handle) => handle.get(self.result_timeout).await,
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Bound queueing and execution of one job by `result_timeout`.
    ///
    /// A full queue counts against the same deadline as the job itself.
    async fn within_timeout<T>(
        &self,
        job: impl Future<Output = std::result::Result<T, TaskError>>,
    ) -> std::result::Result<T, TaskError> {
        match tokio::time::timeout(self.result_timeout, job).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Task not completed within {:?}", self.result_timeout);
                Err(TaskError::Timeout(self.result_timeout))
            }
        }
    }

    async fn fetch_image(&self, request: &PredictRequest) -> Result<Vec<u8>> {
        self.fetcher
            .fetch(&request.image_name)
            .await
            .map_err(|e| {
                tracing::error!(image = %request.image_name, "Image fetch failed: {}", e);
                Error::Fetch(e)
            })
    }

    fn finish(
        &self,
        request: &PredictRequest,
        prediction: Prediction,
        context: ContextResult,
    ) -> Result<PredictResponse> {
        let record = PredictionRecord::new(request.incident_id.clone(), &prediction, &context)
            .map_err(|e| {
                tracing::warn!(image = %request.image_name, "Rejecting prediction result: {}", e);
                Error::Validation(e)
            })?;

        self.store.insert(&record).map_err(|e| {
            tracing::error!(incident_id = %record.incident_id, "Failed to save prediction: {}", e);
            Error::Persistence(e)
        })?;

        tracing::info!(
            incident_id = %record.incident_id,
            label = %record.incident_type,
            "Prediction pipeline complete"
        );

        Ok(response_for(&record, prediction.probabilities))
    }
}
