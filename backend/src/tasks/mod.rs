//! Task queue layer.
//!
//! Exposes the prediction and context adapters as independently dispatchable
//! jobs executed by an in-process worker pool. There is no retry, priority or
//! batching; a caller dispatches, then waits on the handle with a timeout.

mod queue;
mod worker;

pub use queue::{Job, QueuedJob, TaskError, TaskHandle, TaskQueue};
pub use worker::TaskWorker;
