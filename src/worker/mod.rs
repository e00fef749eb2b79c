//! Queue & Worker Runtime (§4.4): long-running consumer bound to one queue and
//! a pipeline builder. Pulls, runs the pipeline sequentially and fail-fast,
//! applies the §7 retry/backoff/cancellation policy, acks or nacks.

use std::sync::Arc;

use tokio::sync::watch;

use crate::action::{ActionFactory, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::queue::{Job, NackReason, Queue};
use crate::types::ActionContext;

type PipelineBuilderFn<D> = Box<dyn Fn(&ActionFactory<D>, &D) -> Result<Vec<Box<dyn crate::action::Action<D>>>, PipelineError> + Send + Sync>;

pub struct Worker<D: Send + Sync + Clone + 'static> {
    name: String,
    queue: Arc<dyn Queue<D>>,
    factory: ActionFactory<D>,
    deps: Arc<WorkerDeps>,
    build_pipeline: PipelineBuilderFn<D>,
    shutdown: watch::Receiver<bool>,
}

impl<D: Send + Sync + Clone + 'static> Worker<D> {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn Queue<D>>,
        factory: ActionFactory<D>,
        deps: Arc<WorkerDeps>,
        build_pipeline: PipelineBuilderFn<D>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            factory,
            deps,
            build_pipeline,
            shutdown,
        }
    }

    /// Runs until the shutdown signal flips true. In-flight jobs are allowed
    /// to finish their current action; the cancel check happens only between
    /// actions (§5's "not mid-action" rule).
    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                tracing::info!(worker = %self.name, "shutdown signal observed, stopping");
                return;
            }

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!(worker = %self.name, "shutdown signal observed, stopping");
                        return;
                    }
                }
                job = self.queue.pull() => {
                    if let Some(job) = job {
                        self.process(job).await;
                    }
                }
            }
        }
    }

    async fn process(&self, job: Job<D>) {
        let pipeline = match (self.build_pipeline)(&self.factory, &job.payload) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                tracing::error!(worker = %self.name, job_id = %job.job_id, error = %err, "failed to build pipeline");
                let _ = self.queue.nack(&job.job_id, NackReason::Fatal, None).await;
                return;
            }
        };

        let mut ctx = ActionContext::new(job.job_id.clone(), self.queue.name().to_string(), self.name.clone()).with_attempt(job.attempt_number);
        let job_id = job.job_id.clone();
        let attempt_number = job.attempt_number;
        let mut data = job.payload;
        let mut failure: Option<(PipelineError, bool)> = None;

        for action in &pipeline {
            if *self.shutdown.borrow() {
                failure = Some((PipelineError::Cancelled(format!("worker '{}' shutting down", self.name)), false));
                break;
            }

            ctx.operation = action.name().to_string();
            if let Err(err) = action.validate_input(&data) {
                failure = Some((err, action.retryable()));
                break;
            }

            match action.execute(data.clone(), &self.deps, &ctx).await {
                Ok(next) => data = next,
                Err(err) => {
                    let retryable = action.retryable();
                    failure = Some((err, retryable));
                    break;
                }
            }
        }

        match failure {
            None => {
                if let Err(err) = self.queue.ack(&job_id).await {
                    tracing::error!(worker = %self.name, %job_id, error = %err, "ack failed");
                }
            }
            Some((err, action_retryable)) => self.handle_failure(&job_id, attempt_number, err, action_retryable).await,
        }
    }

    async fn handle_failure(&self, job_id: &str, attempt_number: u32, err: PipelineError, action_retryable: bool) {
        if err.is_cancelled() {
            tracing::info!(worker = %self.name, %job_id, "job cancelled");
            let _ = self.queue.nack(job_id, NackReason::Cancelled, None).await;
            return;
        }

        if err.is_fatal() || !action_retryable {
            tracing::error!(worker = %self.name, %job_id, error = %err, "fatal failure");
            let _ = self.queue.nack(job_id, NackReason::Fatal, None).await;
            return;
        }

        if err.is_retryable() && attempt_number < self.deps.config.retry.max_attempts {
            let backoff = self.deps.config.retry.backoff_for_attempt(attempt_number);
            tracing::warn!(worker = %self.name, %job_id, attempt_number, ?backoff, error = %err, "retrying after backoff");
            let _ = self.queue.nack(job_id, NackReason::Retryable, Some(backoff)).await;
            return;
        }

        tracing::error!(worker = %self.name, %job_id, attempt_number, error = %err, "retries exhausted");
        let _ = self.queue.nack(job_id, NackReason::Fatal, None).await;
    }
}
