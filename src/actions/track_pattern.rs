//! `track_pattern` (§9): an independent worker whose action records an
//! observed ingredient/instruction pattern. Deliberately decoupled from the
//! Completion Tracker — pattern frequency is a side observation, not part of
//! a note's completion state (documented Open Question decision in DESIGN.md).

use async_trait::async_trait;

use crate::action::{Action, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, PatternTrackingJobData};

pub struct TrackPattern;

#[async_trait]
impl Action<PatternTrackingJobData> for TrackPattern {
    fn name(&self) -> &'static str {
        "track_pattern"
    }

    fn validate_input(&self, data: &PatternTrackingJobData) -> Result<(), PipelineError> {
        if data.pattern.trim().is_empty() {
            return Err(PipelineError::invalid_input("track_pattern requires a non-empty pattern"));
        }
        Ok(())
    }

    async fn execute(&self, data: PatternTrackingJobData, _deps: &WorkerDeps, _ctx: &ActionContext) -> Result<PatternTrackingJobData, PipelineError> {
        tracing::debug!(pattern = %data.pattern, note_id = ?data.note_id, "observed recipe line pattern");
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

    #[test]
    fn empty_pattern_is_invalid_input() {
        let action = TrackPattern;
        let job = PatternTrackingJobData {
            note_id: None,
            pattern: "  ".to_string(),
            job_id: "j1".to_string(),
        };
        let err = action.validate_input(&job).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn a_real_pattern_passes_through_unchanged() {
        let deps = deps();
        let job = PatternTrackingJobData {
            note_id: Some("note-A".to_string()),
            pattern: "quantity-unit-name".to_string(),
            job_id: "j1".to_string(),
        };
        let action = TrackPattern;
        let result = action.execute(job, &deps, &ActionContext::new("j1", "pattern_tracking", "pattern-tracking-worker")).await.unwrap();
        assert_eq!(result.pattern, "quantity-unit-name");
    }
}
