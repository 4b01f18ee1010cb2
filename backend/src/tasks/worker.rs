//! Worker pool that executes queued jobs.
//!
//! The worker runs an async loop that takes jobs off the queue and runs each
//! on its own task, with at most `concurrency` jobs executing at once.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use super::queue::{Job, QueuedJob};
use crate::adapters::{ContextAdapter, PredictionAdapter};

pub struct TaskWorker {
    jobs: mpsc::Receiver<QueuedJob>,
    prediction: Arc<PredictionAdapter>,
    context: Arc<ContextAdapter>,
    limit: Arc<Semaphore>,
}

impl TaskWorker {
    pub fn new(
        jobs: mpsc::Receiver<QueuedJob>,
        prediction: Arc<PredictionAdapter>,
        context: Arc<ContextAdapter>,
        concurrency: usize,
    ) -> Self {
        Self {
            jobs,
            prediction,
            context,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Run until every `TaskQueue` sender is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            "Task worker started (concurrency={})",
            self.limit.available_permits()
        );

        loop {
            // Take a slot first so waiting jobs stay in the bounded queue.
            let permit = match self.limit.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let Some(queued) = self.jobs.recv().await else {
                break;
            };

            let prediction = self.prediction.clone();
            let context = self.context.clone();
            tokio::spawn(async move {
                execute(queued, &prediction, &context).await;
                drop(permit);
            });
        }

        tracing::info!("Task queue closed, worker stopping");
    }
}

async fn execute(queued: QueuedJob, prediction: &PredictionAdapter, context: &ContextAdapter) {
    let QueuedJob {
        id,
        job,
        enqueued_at,
    } = queued;
    let kind = job.kind();

    if job.is_abandoned() {
        tracing::debug!(task_id = %id, kind, "Skipping task, caller stopped waiting");
        return;
    }

    tracing::debug!(
        task_id = %id,
        kind,
        waited_ms = %enqueued_at.elapsed().as_millis(),
        "Task started"
    );

    // A send error means the caller gave up waiting; the result is dropped.
    let delivered = match job {
        Job::Predict { image, reply } => {
            let result = prediction.perform_prediction(&image).await;
            reply.send(result).is_ok()
        }
        Job::Context {
            label,
            sensitive_structures,
            reply,
        } => {
            let result = context
                .fetch_contextual_information(&label, &sensitive_structures)
                .await;
            reply.send(result).is_ok()
        }
    };

    if delivered {
        tracing::debug!(task_id = %id, kind, "Task finished");
    } else {
        tracing::debug!(task_id = %id, kind, "Task finished after its caller stopped waiting");
    }
}
