//! Job queue for the prediction and context adapters.
//!
//! Dispatch hands back a `TaskHandle`; the job itself runs on the
//! `TaskWorker` pool and its result comes back over a oneshot channel.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::adapters::AdapterError;
use crate::models::{ContextResult, Prediction};

/// Why a job produced no result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("Task timed out after {0:?}")]
    Timeout(Duration),
    #[error("Task failed: {0}")]
    Failed(#[from] AdapterError),
    #[error("Worker dropped the task before completing it")]
    WorkerLost,
    #[error("Task queue is closed")]
    QueueClosed,
}

type Reply<T> = oneshot::Sender<Result<T, AdapterError>>;

/// Unit of work understood by the worker pool.
pub enum Job {
    Predict {
        image: Vec<u8>,
        reply: Reply<Prediction>,
    },
    Context {
        label: String,
        sensitive_structures: Vec<String>,
        reply: Reply<ContextResult>,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Predict { .. } => "predict",
            Job::Context { .. } => "context",
        }
    }

    /// True once the caller dropped its handle.
    pub fn is_abandoned(&self) -> bool {
        match self {
            Job::Predict { reply, .. } => reply.is_closed(),
            Job::Context { reply, .. } => reply.is_closed(),
        }
    }
}

/// A job waiting in the queue.
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
    /// When this job was enqueued.
    pub enqueued_at: Instant,
}

/// Handle to a dispatched job.
pub struct TaskHandle<T> {
    id: Uuid,
    rx: oneshot::Receiver<Result<T, AdapterError>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the job result, failing after `timeout`.
    ///
    /// After a timeout the job keeps running; its result is discarded.
    pub async fn get(self, timeout: Duration) -> Result<T, TaskError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Err(_) => {
                tracing::warn!(task_id = %self.id, "Task result not ready after {:?}", timeout);
                Err(TaskError::Timeout(timeout))
            }
            Ok(Err(_)) => Err(TaskError::WorkerLost),
            Ok(Ok(result)) => result.map_err(TaskError::Failed),
        }
    }
}

/// Sending side of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<QueuedJob>,
}

impl TaskQueue {
    /// Create a queue holding up to `capacity` pending jobs.
    ///
    /// The receiver goes to a `TaskWorker`.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an image classification job.
    pub async fn dispatch_prediction(
        &self,
        image: Vec<u8>,
    ) -> Result<TaskHandle<Prediction>, TaskError> {
        let (reply, rx) = oneshot::channel();
        let id = self.enqueue(Job::Predict { image, reply }).await?;
        Ok(TaskHandle { id, rx })
    }

    /// Queue a context generation job for a predicted label.
    pub async fn dispatch_context(
        &self,
        label: String,
        sensitive_structures: Vec<String>,
    ) -> Result<TaskHandle<ContextResult>, TaskError> {
        let (reply, rx) = oneshot::channel();
        let id = self
            .enqueue(Job::Context {
                label,
                sensitive_structures,
                reply,
            })
            .await?;
        Ok(TaskHandle { id, rx })
    }

    async fn enqueue(&self, job: Job) -> Result<Uuid, TaskError> {
        let id = Uuid::new_v4();
        let kind = job.kind();
        let queued = QueuedJob {
            id,
            job,
            enqueued_at: Instant::now(),
        };

        self.tx
            .send(queued)
            .await
            .map_err(|_| TaskError::QueueClosed)?;

        tracing::debug!(task_id = %id, kind, "Task dispatched");
        Ok(id)
    }
}
