//! `InMemoryQueue<D>` — FIFO per queue, `jobId`-keyed dedup window, delayed
//! re-enqueue for retry backoff. A runnable stand-in for whatever production
//! queue implements the §6 interface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::core::errors::PipelineError;

use super::{Job, JobOptions, NackReason, Queue};

const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(600);

struct QueueInner<D> {
    name: String,
    pending: Mutex<VecDeque<Job<D>>>,
    in_flight: DashMap<String, Job<D>>,
    succeeded: DashMap<String, Instant>,
    notify: Notify,
    default_dedupe_window: Duration,
}

pub struct InMemoryQueue<D> {
    inner: Arc<QueueInner<D>>,
}

impl<D> Clone for InMemoryQueue<D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<D: Send + Sync + 'static> InMemoryQueue<D> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                pending: Mutex::new(VecDeque::new()),
                in_flight: DashMap::new(),
                succeeded: DashMap::new(),
                notify: Notify::new(),
                default_dedupe_window: DEFAULT_DEDUPE_WINDOW,
            }),
        }
    }

    pub fn len(&self) -> usize {
        // Best-effort synchronous snapshot; only used by tests/diagnostics.
        self.inner.pending.try_lock().map(|q| q.len()).unwrap_or(0)
    }
}

async fn is_duplicate<D>(inner: &QueueInner<D>, job_id: &str, window: Duration) -> bool {
    if inner.in_flight.contains_key(job_id) {
        return true;
    }
    if let Some(at) = inner.succeeded.get(job_id) {
        if at.elapsed() < window {
            return true;
        }
    }
    let pending = inner.pending.lock().await;
    pending.iter().any(|job| job.job_id == job_id)
}

async fn enqueue_now<D>(inner: &Arc<QueueInner<D>>, job: Job<D>) {
    let mut pending = inner.pending.lock().await;
    pending.push_back(job);
    drop(pending);
    inner.notify.notify_one();
}

#[async_trait]
impl<D: Send + Sync + Clone + 'static> Queue<D> for InMemoryQueue<D> {
    async fn add(&self, action_name: &'static str, data: D, options: JobOptions) -> Result<(), PipelineError> {
        let job_id = options.job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let window = options.dedupe_window.unwrap_or(self.inner.default_dedupe_window);

        if is_duplicate(&self.inner, &job_id, window).await {
            tracing::debug!(queue = %self.inner.name, %job_id, "duplicate add() is a no-op");
            return Ok(());
        }

        let job = Job {
            job_id: job_id.clone(),
            action_name,
            attempt_number: 1,
            payload: data,
            enqueued_at: Utc::now(),
        };

        if let Some(delay) = options.delay {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                enqueue_now(&inner, job).await;
            });
        } else {
            enqueue_now(&self.inner, job).await;
        }

        Ok(())
    }

    async fn pull(&self) -> Option<Job<D>> {
        loop {
            {
                let mut pending = self.inner.pending.lock().await;
                if let Some(job) = pending.pop_front() {
                    self.inner.in_flight.insert(job.job_id.clone(), job.clone());
                    return Some(job);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    async fn ack(&self, job_id: &str) -> Result<(), PipelineError> {
        self.inner.in_flight.remove(job_id);
        self.inner.succeeded.insert(job_id.to_string(), Instant::now());
        Ok(())
    }

    async fn nack(&self, job_id: &str, reason: NackReason, retry_after: Option<Duration>) -> Result<(), PipelineError> {
        let Some((_, mut job)) = self.inner.in_flight.remove(job_id) else {
            return Ok(());
        };

        match reason {
            NackReason::Retryable => {
                job.attempt_number += 1;
                if let Some(delay) = retry_after {
                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        enqueue_now(&inner, job).await;
                    });
                } else {
                    enqueue_now(&self.inner, job).await;
                }
            }
            NackReason::Fatal | NackReason::Cancelled => {
                tracing::warn!(queue = %self.inner.name, %job_id, ?reason, "job terminated without retry");
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_pull_returns_the_job() {
        let queue: InMemoryQueue<u32> = InMemoryQueue::new("test");
        queue.add("noop", 42, JobOptions { job_id: Some("j1".into()), ..Default::default() }).await.unwrap();
        let job = queue.pull().await.unwrap();
        assert_eq!(job.payload, 42);
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.attempt_number, 1);
    }

    #[tokio::test]
    async fn duplicate_job_id_add_is_a_no_op() {
        let queue: InMemoryQueue<u32> = InMemoryQueue::new("test");
        let opts = || JobOptions { job_id: Some("dup".into()), ..Default::default() };
        queue.add("noop", 1, opts()).await.unwrap();
        queue.add("noop", 2, opts()).await.unwrap();
        assert_eq!(queue.len(), 1);
        let job = queue.pull().await.unwrap();
        assert_eq!(job.payload, 1);
    }

    #[tokio::test]
    async fn nack_retryable_without_delay_requeues_with_incremented_attempt() {
        let queue: InMemoryQueue<u32> = InMemoryQueue::new("test");
        queue.add("noop", 1, JobOptions { job_id: Some("j1".into()), ..Default::default() }).await.unwrap();
        let job = queue.pull().await.unwrap();
        queue.nack(&job.job_id, NackReason::Retryable, None).await.unwrap();
        let retried = queue.pull().await.unwrap();
        assert_eq!(retried.attempt_number, 2);
    }

    #[tokio::test]
    async fn nack_fatal_does_not_requeue() {
        let queue: InMemoryQueue<u32> = InMemoryQueue::new("test");
        queue.add("noop", 1, JobOptions { job_id: Some("j1".into()), ..Default::default() }).await.unwrap();
        let job = queue.pull().await.unwrap();
        queue.nack(&job.job_id, NackReason::Fatal, None).await.unwrap();
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn ack_allows_a_future_add_with_the_same_id_once_dedupe_window_is_bypassed() {
        let queue: InMemoryQueue<u32> = InMemoryQueue::new("test");
        let opts = || JobOptions {
            job_id: Some("j1".into()),
            dedupe_window: Some(Duration::from_millis(0)),
            ..Default::default()
        };
        queue.add("noop", 1, opts()).await.unwrap();
        let job = queue.pull().await.unwrap();
        queue.ack(&job.job_id).await.unwrap();
        queue.add("noop", 2, opts()).await.unwrap();
        let second = queue.pull().await.unwrap();
        assert_eq!(second.payload, 2);
    }
}
