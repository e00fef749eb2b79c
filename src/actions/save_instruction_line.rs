//! `save_instruction_line` (§4.1, §8 scenario 4): the instruction worker's
//! second action. Persists the formatted reference unless `format_instruction_line`
//! flagged it dropped, then signals the tracker either way so the dropped line
//! still counts toward the kind's expected/observed total.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::repository::UpdatedLine;
use crate::types::{ActionContext, LineJobData, StatusEvent, WorkerKind};

pub struct SaveInstructionLine;

#[async_trait]
impl Action<LineJobData> for SaveInstructionLine {
    fn name(&self) -> &'static str {
        "save_instruction_line"
    }

    async fn execute(&self, data: LineJobData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<LineJobData, PipelineError> {
        let note_id = data.note_id.clone();
        let import_id = data.import_id.clone();
        let line_index = data.line_index;
        let reference = data.reference.clone();
        let dropped = data.metadata.get("dropped").and_then(|v| v.as_bool()).unwrap_or(false);

        execute_service_action(
            &deps.broadcaster,
            import_id,
            Some(note_id.clone()),
            ServiceActionOptions {
                context_name: "instruction_processing",
                complete_context: None,
                start_message: "Saving instruction line",
                completion_message: "Instruction line saved",
                suppress_default_broadcast: true,
            },
            || async {
                if !dropped {
                    deps.repository.update_instruction_line(&note_id, line_index, &reference, "completed", true).await?;
                }
                deps.tracker.mark_line_completed(&note_id, WorkerKind::Instruction, line_index).await
            },
            None::<fn(&()) -> Vec<StatusEvent>>,
        )
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
    use crate::types::LineKind;
    use serde_json::json;
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

    #[tokio::test]
    async fn persists_and_marks_the_line_completed() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Instruction, 1).await.unwrap();

        let mut job = LineJobData::new("note-A", None, LineKind::Instruction, "Mix ingredients.", 0);
        job.metadata = json!({ "dropped": false });

        let action = SaveInstructionLine;
        action.execute(job, &deps, &ActionContext::new("j1", "instruction", "instruction-worker")).await.unwrap();

        assert_eq!(deps.tracker.observed_count("note-A", WorkerKind::Instruction), 1);
    }

    #[tokio::test]
    async fn a_dropped_line_still_counts_toward_completion_without_persisting() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Instruction, 1).await.unwrap();

        let mut job = LineJobData::new("note-A", None, LineKind::Instruction, "", 0);
        job.metadata = json!({ "dropped": true });

        let action = SaveInstructionLine;
        action.execute(job, &deps, &ActionContext::new("j1", "instruction", "instruction-worker")).await.unwrap();

        assert_eq!(deps.tracker.observed_count("note-A", WorkerKind::Instruction), 1);
    }
}
