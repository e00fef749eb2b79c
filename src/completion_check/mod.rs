//! Completion-Check Jobs (§4.10): sentinels that observe aggregate tracker
//! progress for one kind and either settle or re-enqueue themselves with
//! doubling backoff, up to `CompletionCheckConfig::max_retries`.

use async_trait::async_trait;

use crate::action::{Action, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::queue::JobOptions;
use crate::types::{ActionContext, CompletionCheckJobData, EventStatus, LineKind, StatusEvent};

pub struct CheckCompletion {
    kind: LineKind,
}

impl CheckCompletion {
    pub fn ingredient() -> Self {
        Self { kind: LineKind::Ingredient }
    }

    pub fn instruction() -> Self {
        Self { kind: LineKind::Instruction }
    }
}

#[async_trait]
impl Action<CompletionCheckJobData> for CheckCompletion {
    fn name(&self) -> &'static str {
        match self.kind {
            LineKind::Ingredient => "check_ingredient_completion",
            LineKind::Instruction => "check_instruction_completion",
        }
    }

    /// Retries are the sentinel's own re-enqueue loop, not the worker's
    /// backoff-and-nack loop; a real failure here (retry budget exhausted on a
    /// required kind) is always terminal.
    fn retryable(&self) -> bool {
        false
    }

    async fn execute(&self, data: CompletionCheckJobData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<CompletionCheckJobData, PipelineError> {
        let worker_kind = self.kind.as_worker_kind();
        let expected = deps.tracker.expected_count(&data.note_id, worker_kind);
        let observed = deps.tracker.observed_count(&data.note_id, worker_kind);

        if let Some(expected) = expected {
            if observed >= expected {
                tracing::debug!(note_id = %data.note_id, kind = %self.kind.as_str(), "completion check satisfied");
                return Ok(data);
            }
        }

        if data.attempt >= deps.config.completion_check.max_retries {
            deps.broadcaster
                .add_status_event_and_broadcast(
                    StatusEvent::new(EventStatus::Failed, self.name(), format!("{} completion check exhausted retries", self.kind.as_str()))
                        .with_import_id(data.import_id.clone())
                        .with_note_id(Some(data.note_id.clone())),
                )
                .await;

            if worker_kind.is_required() {
                return Err(PipelineError::Exhausted(format!(
                    "completion check for '{}' exhausted retries on note '{}'",
                    self.kind.as_str(),
                    data.note_id
                )));
            }
            return Ok(data);
        }

        let mut next = data.clone();
        next.attempt += 1;
        let backoff = deps.config.completion_check.backoff_for_retry(data.attempt);
        let job_id = next.job_id.clone();
        deps.queues
            .categorization
            .add(self.name(), next, JobOptions { job_id: Some(job_id), delay: Some(backoff), ..Default::default() })
            .await?;

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::StatusBroadcaster;
    use crate::cache::ActionCache;
    use crate::core::config::defaults::default_config;
    use crate::queue::QueueHandles;
    use crate::repository::InMemoryRepository;
    use crate::storage::InMemoryObjectStorage;
    use crate::tracker::CompletionTracker;
    use crate::types::WorkerKind;
    use std::sync::Arc;

    fn deps() -> WorkerDeps {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        WorkerDeps {
            broadcaster: broadcaster.clone(),
            cache: Arc::new(ActionCache::new()),
            tracker: Arc::new(CompletionTracker::new(broadcaster)),
            repository: Arc::new(InMemoryRepository::new()),
            storage: Arc::new(InMemoryObjectStorage::new()),
            queues: QueueHandles::in_memory(),
            config: Arc::new(default_config()),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new("job-1", "categorization", "categorization-worker")
    }

    #[tokio::test]
    async fn settles_once_observed_reaches_expected() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 1).await.unwrap();
        deps.tracker.mark_line_completed("note-A", WorkerKind::Ingredient, 0).await.unwrap();

        let action = CheckCompletion::ingredient();
        let job = CompletionCheckJobData::new("note-A", None, LineKind::Ingredient);
        action.execute(job, &deps, &ctx()).await.unwrap();
        assert!(deps.queues.categorization.pull().await.is_none());
    }

    #[tokio::test]
    async fn reenqueues_itself_with_incremented_attempt_while_not_yet_satisfied() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 2).await.unwrap();
        deps.tracker.mark_line_completed("note-A", WorkerKind::Ingredient, 0).await.unwrap();

        let action = CheckCompletion::ingredient();
        let job = CompletionCheckJobData::new("note-A", None, LineKind::Ingredient);
        action.execute(job, &deps, &ctx()).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        let requeued = deps.queues.categorization.pull().await.unwrap();
        assert_eq!(requeued.payload.attempt, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_on_a_required_kind_is_fatal() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 2).await.unwrap();

        let action = CheckCompletion::ingredient();
        let mut job = CompletionCheckJobData::new("note-A", None, LineKind::Ingredient);
        job.attempt = deps.config.completion_check.max_retries;
        let err = action.execute(job, &deps, &ctx()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Exhausted(_)));
    }
}
