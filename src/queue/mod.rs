//! The external Queue interface (§6) plus a runnable in-memory implementation.
//!
//! §6 only specifies the *interface* the core consumes; the core's own Worker
//! runtime (and its tests) need a runnable instance. Grounded on the pack's
//! job-queue examples (`hua0512-rust-srec`'s `Job`/`JobStatus`/dedup-by-id shape,
//! `groblegark/oddjobs`'s runtime pipeline), adapted to this spec's simpler
//! envelope: FIFO per queue name, `jobId`-keyed dedup window, delayed re-enqueue
//! for retry backoff.

pub mod handles;
pub mod in_memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::errors::PipelineError;

pub use handles::QueueHandles;
pub use in_memory::InMemoryQueue;

/// Immutable envelope delivered by a queue (§3).
#[derive(Debug, Clone)]
pub struct Job<D> {
    pub job_id: String,
    pub action_name: &'static str,
    pub attempt_number: u32,
    pub payload: D,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Overrides the generated job id. All of this crate's payload types carry
    /// a deterministic id already (§3 `LineJobData`/`CompletionCheckJobData`);
    /// callers pass it through here so the queue's dedup check can see it.
    pub job_id: Option<String>,
    pub delay: Option<Duration>,
    pub dedupe_window: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// Retryable failure under `maxAttempts`; re-enqueue after `retry_after`.
    Retryable,
    /// `InvalidInput` / `MissingDependency` / `ProgrammingError` — never retried.
    Fatal,
    /// Cooperative cancellation — terminal without retry, no `FAILED` event.
    Cancelled,
}

#[async_trait]
pub trait Queue<D: Send + Sync + 'static>: Send + Sync {
    /// Enqueues a job whose first action is `action_name`. Idempotent: a job
    /// with an identical `job_id` already pending, in flight, or terminated
    /// successfully within the dedup window is a no-op (§4.4).
    async fn add(&self, action_name: &'static str, data: D, options: JobOptions) -> Result<(), PipelineError>;

    /// Blocking retrieval by a worker; waits for a job to become available.
    async fn pull(&self) -> Option<Job<D>>;

    async fn ack(&self, job_id: &str) -> Result<(), PipelineError>;

    async fn nack(&self, job_id: &str, reason: NackReason, retry_after: Option<Duration>) -> Result<(), PipelineError>;

    fn name(&self) -> &str;
}
